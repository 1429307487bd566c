//! SSML document construction for synthesis requests.

use crate::SynthesisRequest;

/// Escape text for use inside an XML element or attribute.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Signed percentage as SSML expects it: `+10%`, `-5%`, `+0%`.
pub fn signed_percent(value: i32) -> String {
    format!("{value:+}%")
}

/// Locale prefix of a neural voice name: `"hi-IN-SwaraNeural"` -> `"hi-IN"`.
pub fn voice_locale(voice: &str) -> Option<&str> {
    let mut parts = voice.splitn(3, '-');
    let lang = parts.next()?;
    let region = parts.next()?;
    parts.next()?;
    Some(&voice[..lang.len() + 1 + region.len()])
}

/// Build the `<speak>` document for a request.
pub fn build_ssml(request: &SynthesisRequest) -> String {
    let lang = if request.language.is_empty() {
        voice_locale(&request.voice).unwrap_or("en-US")
    } else {
        request.language.as_str()
    };
    format!(
        r#"<speak version="1.0" xmlns="http://www.w3.org/2001/10/synthesis" xml:lang="{lang}"><voice name="{voice}"><prosody rate="{rate}" pitch="{pitch}">{text}</prosody></voice></speak>"#,
        lang = escape_xml(lang),
        voice = escape_xml(&request.voice),
        rate = signed_percent(request.rate_percent),
        pitch = signed_percent(request.pitch_percent),
        text = escape_xml(&request.text),
    )
}
