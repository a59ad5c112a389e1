//! Title cleanup and generic-label detection
//!
//! Link text in file listings is full of localized boilerplate: "Download",
//! "Herunterladen", "Vista previa" and friends, either standing alone or
//! bolted onto the real name. These helpers strip the boilerplate and tell
//! the deduplicator which titles are too generic to keep.

use crate::target::has_template_marker;
use url::Url;

/// Localized download/preview action words, stripped from title edges and
/// never usable as a title on their own. Multi-word phrases are supported.
const ACTION_WORDS: &[&str] = &[
    "download",
    "downloaden",
    "herunterladen",
    "télécharger",
    "telecharger",
    "descargar",
    "scarica",
    "scaricare",
    "baixar",
    "preview",
    "vorschau",
    "aperçu",
    "apercu",
    "vista previa",
    "anteprima",
    "view",
    "open",
    "öffnen",
    "offnen",
    "anzeigen",
    "ansehen",
    "voir",
    "ver",
    "abrir",
    "ouvrir",
];

/// Generic placeholder labels (closed list, any supported UI language).
/// A title matching one of these tells us nothing about the document.
const GENERIC_LABELS: &[&str] = &[
    "file",
    "datei",
    "fichier",
    "archivo",
    "document",
    "documento",
    "dokument",
    "attachment",
    "anhang",
    "pièce jointe",
    "piece jointe",
    "adjunto",
    "allegato",
    "anexo",
    "pdf",
    "link",
    "untitled",
    "unbenannt",
    "sans titre",
    "sin título",
    "sin titulo",
    "click here",
    "hier klicken",
    "read more",
];

/// Cleans raw link text into a usable title
///
/// Strips leading/trailing action words (with their separators), collapses
/// whitespace, and rejects text that is nothing but boilerplate.
///
/// # Returns
///
/// * `Some(title)` - Cleaned, non-empty title
/// * `None` - Nothing usable remains (or the text carries a template marker)
pub fn clean_title(raw: &str) -> Option<String> {
    if has_template_marker(raw) {
        return None;
    }

    let collapsed: Vec<&str> = raw.split_whitespace().collect();
    let mut words = collapsed;

    strip_edge_actions(&mut words);

    let result = words.join(" ");
    let result = result
        .trim_matches(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .to_string();

    if result.is_empty() || is_action_phrase(&result) {
        return None;
    }
    Some(result)
}

const SEPARATORS: &[char] = &[' ', '-', ':', '|', '(', ')', '[', ']', ',', '.', '/'];

/// Removes action phrases (and bare separator words) from both ends of the
/// word list until nothing more matches
fn strip_edge_actions(words: &mut Vec<&str>) {
    loop {
        let before = words.len();

        while let Some(n) = phrase_len_at(words, true) {
            words.drain(..n);
        }
        while matches!(words.first(), Some(w) if normalize_word(w).is_empty()) {
            words.remove(0);
        }
        while let Some(n) = phrase_len_at(words, false) {
            let len = words.len();
            words.truncate(len - n);
        }
        while matches!(words.last(), Some(w) if normalize_word(w).is_empty()) {
            words.pop();
        }

        if words.len() == before {
            break;
        }
    }
}

/// Length in words of an action phrase at the start (or end) of the list
fn phrase_len_at(words: &[&str], at_start: bool) -> Option<usize> {
    for phrase in ACTION_WORDS {
        let phrase_words: Vec<&str> = phrase.split(' ').collect();
        let n = phrase_words.len();
        if words.len() < n {
            continue;
        }
        let window = if at_start {
            &words[..n]
        } else {
            &words[words.len() - n..]
        };
        if window
            .iter()
            .zip(&phrase_words)
            .all(|(w, p)| normalize_word(w) == *p)
        {
            return Some(n);
        }
    }
    None
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

fn is_action_phrase(text: &str) -> bool {
    let normalized = normalize_phrase(text);
    ACTION_WORDS.iter().any(|w| *w == normalized)
}

fn normalize_phrase(text: &str) -> String {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a title is a known generic placeholder (or empty)
///
/// Action words count as generic too: a record titled "Download" carries no
/// information and should lose to any real name during merge.
pub fn is_generic_title(title: &str) -> bool {
    let normalized = normalize_phrase(title);
    if normalized.is_empty() {
        return true;
    }
    GENERIC_LABELS.iter().any(|l| *l == normalized)
        || ACTION_WORDS.iter().any(|w| *w == normalized)
}

/// Derives a title from a location's filename segment
///
/// Trailing action segments (`/download`, `/preview`) are skipped; purely
/// numeric segments (bare ids) are rejected.
pub fn title_from_location(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let mut segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    while matches!(segments.last(), Some(s) if is_action_phrase(&s.replace(['_', '-', '+'], " "))) {
        segments.pop();
    }

    let name = segments.pop()?;
    let name = name.replace(['_', '+'], " ");
    let cleaned = clean_title(&name)?;

    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(cleaned)
}

/// Picks the best available title for a sighting
///
/// Preference order: cleaned link text, then the location's filename, then a
/// file-id fallback, then "untitled" (which the deduplicator treats as
/// generic and upgrades when something better comes along).
pub fn best_title(text: &str, location: &str, file_id: Option<u64>) -> String {
    clean_title(text)
        .or_else(|| title_from_location(location))
        .or_else(|| file_id.map(|id| format!("File {}", id)))
        .unwrap_or_else(|| "untitled".to_string())
}
