//! Language catalog: display names, speech locales, and neural voice names.

use serde::Serialize;

use crate::types::VoiceGender;

/// Voice used when a language has no mapping.
pub const FALLBACK_VOICE: &str = "en-US-JennyNeural";

/// Locale used when a code has no mapping.
pub const FALLBACK_LOCALE: &str = "en-US";

/// Targets translated to when the caller gives none.
pub const DEFAULT_TARGET_LANGUAGES: &[&str] = &[
    "hi", "te", "es", "fr", "de", "it", "pt", "ru", "ja", "ko", "zh", "ar", "nl", "pl", "tr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub locale: &'static str,
    pub female_voice: &'static str,
    pub male_voice: &'static str,
}

const fn lang(
    code: &'static str,
    name: &'static str,
    locale: &'static str,
    female_voice: &'static str,
    male_voice: &'static str,
) -> Language {
    Language {
        code,
        name,
        locale,
        female_voice,
        male_voice,
    }
}

pub const CATALOG: &[Language] = &[
    lang("en", "English", "en-US", "en-US-JennyNeural", "en-US-GuyNeural"),
    lang("es", "Spanish", "es-ES", "es-ES-ElviraNeural", "es-ES-AlvaroNeural"),
    lang("fr", "French", "fr-FR", "fr-FR-DeniseNeural", "fr-FR-HenriNeural"),
    lang("de", "German", "de-DE", "de-DE-KatjaNeural", "de-DE-ConradNeural"),
    lang("it", "Italian", "it-IT", "it-IT-ElsaNeural", "it-IT-DiegoNeural"),
    lang("pt", "Portuguese", "pt-BR", "pt-BR-FranciscaNeural", "pt-BR-AntonioNeural"),
    lang("ru", "Russian", "ru-RU", "ru-RU-SvetlanaNeural", "ru-RU-DmitryNeural"),
    lang("ja", "Japanese", "ja-JP", "ja-JP-NanamiNeural", "ja-JP-KeitaNeural"),
    lang("ko", "Korean", "ko-KR", "ko-KR-SunHiNeural", "ko-KR-InJoonNeural"),
    lang("zh", "Chinese", "zh-CN", "zh-CN-XiaoxiaoNeural", "zh-CN-YunyangNeural"),
    lang("hi", "Hindi", "hi-IN", "hi-IN-SwaraNeural", "hi-IN-MadhurNeural"),
    lang("te", "Telugu", "te-IN", "te-IN-ShrutiNeural", "te-IN-MohanNeural"),
    lang("ta", "Tamil", "ta-IN", "ta-IN-PallaviNeural", "ta-IN-ValluvarNeural"),
    lang("ar", "Arabic", "ar-SA", "ar-SA-ZariyahNeural", "ar-SA-HamedNeural"),
    lang("nl", "Dutch", "nl-NL", "nl-NL-FennaNeural", "nl-NL-MaartenNeural"),
    lang("pl", "Polish", "pl-PL", "pl-PL-AgnieszkaNeural", "pl-PL-MarekNeural"),
    lang("tr", "Turkish", "tr-TR", "tr-TR-EmelNeural", "tr-TR-AhmetNeural"),
    lang("sv", "Swedish", "sv-SE", "sv-SE-SofieNeural", "sv-SE-MattiasNeural"),
    lang("th", "Thai", "th-TH", "th-TH-PremwadeeNeural", "th-TH-NiwatNeural"),
    lang("vi", "Vietnamese", "vi-VN", "vi-VN-HoaiMyNeural", "vi-VN-NamMinhNeural"),
];

/// Find a catalog entry by two-letter code (case-insensitive).
pub fn lookup(code: &str) -> Option<&'static Language> {
    CATALOG.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

pub fn speech_locale(code: &str) -> &'static str {
    lookup(code).map(|l| l.locale).unwrap_or(FALLBACK_LOCALE)
}

pub fn language_name(code: &str) -> &'static str {
    lookup(code).map(|l| l.name).unwrap_or("Unknown")
}

/// Voice for `code` in the requested gender.
///
/// Falls back to the other gender when the requested voice is blank, and to
/// [`FALLBACK_VOICE`] for unknown languages.
pub fn tts_voice(code: &str, gender: VoiceGender) -> &'static str {
    let Some(entry) = lookup(code) else {
        return FALLBACK_VOICE;
    };
    let (wanted, other) = match gender {
        VoiceGender::Female => (entry.female_voice, entry.male_voice),
        VoiceGender::Male => (entry.male_voice, entry.female_voice),
    };
    [wanted, other]
        .into_iter()
        .find(|v| !v.is_empty())
        .unwrap_or(FALLBACK_VOICE)
}

/// Strip the region from a locale: `"en-US"` -> `"en"`.
pub fn base_code(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

/// Pick a recognition locale from a `xx_` filename prefix.
///
/// `te_interview.wav` selects `te-IN`; files without a known prefix are English.
pub fn language_from_filename(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    match lower.split_once('_') {
        Some((prefix, _)) => lookup(prefix)
            .map(|l| l.locale)
            .unwrap_or(FALLBACK_LOCALE),
        None => FALLBACK_LOCALE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_twenty_unique_codes() {
        assert_eq!(CATALOG.len(), 20);
        let mut codes: Vec<_> = CATALOG.iter().map(|l| l.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 20);
    }

    #[test]
    fn test_default_targets_are_in_catalog() {
        assert_eq!(DEFAULT_TARGET_LANGUAGES.len(), 15);
        for code in DEFAULT_TARGET_LANGUAGES {
            assert!(lookup(code).is_some(), "missing {code}");
        }
    }

    #[test]
    fn test_lookups_and_fallbacks() {
        assert_eq!(speech_locale("te"), "te-IN");
        assert_eq!(speech_locale("xx"), "en-US");
        assert_eq!(language_name("pt"), "Portuguese");
        assert_eq!(language_name("xx"), "Unknown");
    }

    #[test]
    fn test_tts_voice_by_gender() {
        assert_eq!(tts_voice("hi", VoiceGender::Female), "hi-IN-SwaraNeural");
        assert_eq!(tts_voice("hi", VoiceGender::Male), "hi-IN-MadhurNeural");
        assert_eq!(tts_voice("klingon", VoiceGender::Male), FALLBACK_VOICE);
    }

    #[test]
    fn test_base_code() {
        assert_eq!(base_code("en-US"), "en");
        assert_eq!(base_code("zh_CN"), "zh");
        assert_eq!(base_code("fr"), "fr");
    }

    #[test]
    fn test_language_from_filename() {
        assert_eq!(language_from_filename("te_interview.wav"), "te-IN");
        assert_eq!(language_from_filename("HI_news.mp3"), "hi-IN");
        assert_eq!(language_from_filename("meeting_notes.wav"), "en-US");
        assert_eq!(language_from_filename("plain.wav"), "en-US");
    }
}
