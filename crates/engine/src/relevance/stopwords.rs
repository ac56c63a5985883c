//! Per-language stop words
//!
//! Languages are matched on their primary subtag. Unknown languages use the
//! English list. Words shorter than three characters are listed for
//! completeness even though the tokenizer already drops them.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "cannot", "could", "did", "does", "doing", "down", "during", "each", "even", "every",
    "few", "for", "from", "further", "get", "got", "had", "has", "have", "having", "her", "here",
    "hers", "herself", "him", "himself", "his", "how", "however", "into", "its", "itself", "just",
    "like", "made", "make", "many", "may", "more", "most", "much", "must", "myself", "never",
    "new", "nor", "not", "now", "off", "once", "one", "only", "other", "our", "ours", "ourselves",
    "out", "over", "own", "same", "she", "should", "since", "some", "still", "such", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "too", "under", "until", "upon", "use", "used", "using", "very",
    "was", "way", "well", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
];

const FRENCH: &[&str] = &[
    "au", "aux", "avec", "avoir", "bien", "ce", "ceci", "cela", "celle", "celles", "celui",
    "ces", "cet", "cette", "comme", "comment", "dans", "des", "donc", "dont", "elle", "elles",
    "encore", "entre", "est", "et", "etc", "être", "été", "eux", "fait", "faire", "leur",
    "leurs", "lui", "mais", "même", "mes", "moi", "mon", "nos", "notre", "nous", "ont", "où",
    "par", "pas", "peu", "peut", "plus", "pour", "quand", "que", "quel", "quelle", "quelles",
    "quels", "qui", "sans", "ses", "son", "sont", "sous", "sur", "ton", "tous", "tout", "toute",
    "toutes", "très", "une", "vos", "votre", "vous",
];

const GERMAN: &[&str] = &[
    "aber", "alle", "allem", "allen", "aller", "alles", "als", "also", "am", "an", "auch", "auf",
    "aus", "bei", "bin", "bis", "bist", "da", "damit", "dann", "das", "dass", "dein", "dem",
    "den", "denn", "der", "des", "dich", "die", "dies", "diese", "diesem", "diesen", "dieser",
    "dieses", "doch", "dort", "durch", "ein", "eine", "einem", "einen", "einer", "eines", "er",
    "es", "etwas", "euch", "für", "hat", "hatte", "hier", "ich", "ihm", "ihn", "ihr", "ihre",
    "im", "in", "ist", "jede", "jeder", "kann", "kein", "keine", "man", "mehr", "mein", "mich",
    "mit", "muss", "nach", "nicht", "noch", "nur", "oder", "ohne", "sehr", "sein", "seine",
    "sich", "sie", "sind", "so", "über", "um", "und", "uns", "unter", "vom", "von", "vor", "war",
    "waren", "was", "weil", "wenn", "werden", "wie", "wir", "wird", "zu", "zum", "zur", "zwischen",
];

const SPANISH: &[&str] = &[
    "al", "algo", "algunos", "ante", "antes", "como", "con", "contra", "cual", "cuando", "del",
    "desde", "donde", "durante", "el", "ella", "ellas", "ellos", "en", "entre", "era", "es",
    "esa", "esas", "ese", "eso", "esos", "esta", "estas", "este", "esto", "estos", "fue", "ha",
    "hay", "las", "le", "les", "lo", "los", "más", "mi", "muy", "nada", "ni", "no", "nos",
    "nosotros", "o", "otra", "otro", "para", "pero", "poco", "por", "porque", "que", "quien",
    "se", "ser", "si", "sin", "sobre", "son", "su", "sus", "también", "tanto", "te", "tiene",
    "todo", "todos", "tu", "un", "una", "uno", "unos", "usted", "ya", "yo",
];

const ITALIAN: &[&str] = &[
    "agli", "ai", "al", "alla", "alle", "allo", "anche", "che", "chi", "come", "con", "cosa",
    "così", "dal", "dalla", "dalle", "degli", "dei", "del", "della", "delle", "dello", "di",
    "dove", "ed", "era", "gli", "il", "in", "io", "la", "le", "lei", "lo", "loro", "lui", "ma",
    "mi", "mio", "nei", "nel", "nella", "nelle", "noi", "non", "per", "perché", "più", "poi",
    "quale", "quando", "quella", "quello", "questa", "questo", "sei", "si", "sia", "sono", "sua",
    "sue", "sui", "sul", "sulla", "suo", "tra", "tu", "tutti", "tutto", "una", "uno", "voi",
];

const PORTUGUESE: &[&str] = &[
    "ao", "aos", "as", "até", "com", "como", "da", "das", "de", "dela", "dele", "deles", "do",
    "dos", "ela", "elas", "ele", "eles", "em", "entre", "era", "essa", "esse", "esta", "está",
    "este", "eu", "foi", "há", "isso", "isto", "já", "lhe", "mais", "mas", "mesmo", "muito",
    "na", "nas", "nem", "no", "nos", "nós", "num", "numa", "os", "ou", "para", "pela", "pelo",
    "por", "qual", "quando", "que", "quem", "se", "sem", "ser", "seu", "seus", "sua", "suas",
    "também", "tem", "têm", "um", "uma", "umas", "uns", "você", "vocês",
];

const DUTCH: &[&str] = &[
    "aan", "al", "als", "bij", "dan", "dat", "de", "der", "deze", "die", "dit", "doch", "door",
    "een", "en", "er", "geen", "haar", "had", "heb", "hebben", "heeft", "hem", "het", "hier",
    "hij", "hoe", "hun", "ik", "in", "is", "je", "kan", "maar", "me", "meer", "men", "met",
    "mij", "naar", "niet", "nog", "nu", "of", "om", "omdat", "ons", "ook", "op", "over", "te",
    "tot", "uit", "van", "veel", "voor", "want", "was", "wat", "we", "wel", "werd", "wie", "wij",
    "worden", "zal", "ze", "zich", "zij", "zijn", "zo", "zonder",
];

const SWEDISH: &[&str] = &[
    "alla", "allt", "att", "av", "blev", "bli", "blir", "de", "dem", "den", "denna", "deras",
    "dess", "det", "detta", "dig", "din", "ditt", "där", "efter", "ej", "eller", "en", "er",
    "ett", "för", "från", "har", "hade", "han", "hans", "henne", "hon", "honom", "hur", "här",
    "icke", "inte", "ingen", "jag", "kan", "man", "med", "mellan", "men", "mig", "min", "mot",
    "mycket", "någon", "något", "när", "och", "om", "oss", "på", "samma", "sedan", "sig", "sin",
    "sina", "själv", "skulle", "som", "så", "till", "under", "upp", "ut", "utan", "vad", "var",
    "vara", "vi", "vid", "vilka", "vilken", "åt", "än", "är", "över",
];

const POLISH: &[&str] = &[
    "aby", "ale", "bardzo", "był", "była", "było", "być", "ich", "jak", "jako", "jego", "jej",
    "jest", "jeszcze", "już", "kiedy", "która", "które", "który", "lub", "ma", "może", "mnie",
    "na", "nad", "nie", "nich", "niż", "od", "oraz", "po", "pod", "przez", "przy", "się", "są",
    "tak", "także", "tam", "ten", "też", "tego", "tej", "to", "tylko", "tym", "wiele", "więc",
    "właśnie", "wszystko", "za", "że", "żeby",
];

struct Registry {
    english: HashSet<&'static str>,
    by_language: HashMap<&'static str, HashSet<&'static str>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        english: ENGLISH.iter().copied().collect(),
        by_language: [
            ("en", ENGLISH),
            ("fr", FRENCH),
            ("de", GERMAN),
            ("es", SPANISH),
            ("it", ITALIAN),
            ("pt", PORTUGUESE),
            ("nl", DUTCH),
            ("sv", SWEDISH),
            ("pl", POLISH),
        ]
        .into_iter()
        .map(|(lang, words)| (lang, words.iter().copied().collect()))
        .collect(),
    })
}

/// Languages with a dedicated stop-word list
pub fn supported_languages() -> Vec<&'static str> {
    let mut languages: Vec<&'static str> = registry().by_language.keys().copied().collect();
    languages.sort_unstable();
    languages
}

/// Stop words for a primary language subtag, English when unknown
pub fn stop_words(language: &str) -> &'static HashSet<&'static str> {
    let registry = registry();
    registry
        .by_language
        .get(language)
        .unwrap_or(&registry.english)
}

pub fn is_stop_word(language: &str, token: &str) -> bool {
    stop_words(language).contains(token)
}
