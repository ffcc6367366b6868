// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! Folder-name lexicon used to recognize "sent" and "drafts" folders across languages,
//! matched case-insensitively as a substring of the folder's leaf or full name.

/// "Sent" in each of the languages §6 names.
const SENT_WORDS: &[&str] = &[
    "sent", "gesendet", "envoyés", "envoyes", "enviados", "inviati", "verzonden", "enviadas",
    "отправленные", "已发送", "送信済み", "보낸편지함", "보낸 편지함", "wysłane", "wyslane",
    "odeslané", "odeslane", "odoslané", "odoslane", "elküldött", "gönderilmiş", "gonderilmis",
    "απεσταλμένα", "απεσταλμενα", "lähetetyt", "lahetetyt", "skickat", "sendt", "trimise",
    "изпратени", "poslano", "poslani", "nosūtītie", "nosutitie", "išsiųsti", "issiusti",
    "saadetud", "mibgħuta", "mibghuta", "seolta",
    "المرسلة", "נשלח",
];

/// "Drafts" in each of the languages §6 names.
const DRAFTS_WORDS: &[&str] = &[
    "draft", "entwürfe", "entwurfe", "brouillons", "borradores", "bozze", "concepten",
    "rascunhos", "черновики", "草稿", "下書き", "임시보관함", "szkice", "koncepty", "piszkozatok",
    "taslaklar", "πρόχειρα", "proxeira", "luonnokset", "utkast", "ciorne", "чернови",
    "osnutki", "osnutci", "melnraksti", "juodraščiai", "juodrasciai", "mustandid",
    "abbozzi", "mswaddi", "dréachtaí", "dreachtai",
    "مسودات", "טיוטות",
];

fn matches_any(folder_lower: &str, words: &[&str]) -> bool {
    words.iter().any(|w| folder_lower.contains(w))
}

pub fn is_sent_folder(folder_name: &str) -> bool {
    matches_any(&folder_name.to_lowercase(), SENT_WORDS)
}

pub fn is_drafts_folder(folder_name: &str) -> bool {
    matches_any(&folder_name.to_lowercase(), DRAFTS_WORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_english_sent_folder() {
        assert!(is_sent_folder("Sent Items"));
        assert!(is_sent_folder("INBOX/Sent"));
    }

    #[test]
    fn recognizes_translated_sent_folders() {
        assert!(is_sent_folder("Gesendet"));
        assert!(is_sent_folder("Envoyés"));
        assert!(is_sent_folder("已发送邮件"));
    }

    #[test]
    fn recognizes_drafts_and_excludes_from_sent() {
        assert!(is_drafts_folder("Drafts"));
        assert!(!is_sent_folder("Drafts"));
    }

    #[test]
    fn ordinary_folder_matches_neither() {
        assert!(!is_sent_folder("Archive/2024"));
        assert!(!is_drafts_folder("Archive/2024"));
    }
}
