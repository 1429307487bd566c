//! Batch jobs over directories of audio and transcript CSVs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use speechbridge_core::error::{Result, SpeechBridgeError};
use speechbridge_core::languages;
use speechbridge_core::types::TranslationRecord;
use speechbridge_media::convert;
use speechbridge_providers::{Recognition, SpeechToText, Translator};
use tracing::{info, warn};

use crate::output::OutputLayout;

pub const NO_SPEECH: &str = "[No speech detected]";
const CSV_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// CSV written by the job; `None` when there was nothing to write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// One row of `transcripts.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub filename: String,
    pub language: String,
    #[serde(default)]
    pub language_name: String,
    pub transcript: String,
    #[serde(default)]
    pub original_format: String,
}

/// A transcript is a placeholder when it is a bracketed marker like `[Error: ..]`.
pub fn is_placeholder(transcript: &str) -> bool {
    transcript.starts_with('[') && transcript.ends_with(']')
}

fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && convert::is_audio_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Transcribe every audio file in `input_dir` into a CSV.
///
/// The locale comes from the file name prefix (`te_`, `hi_`, ...). With
/// `convert` set, non-WAV files go through ffmpeg into `<input_dir>/converted`.
pub async fn transcribe_directory(
    stt: &dyn SpeechToText,
    input_dir: &Path,
    output_csv: &Path,
    convert: bool,
) -> Result<BatchSummary> {
    let files = list_audio_files(input_dir)?;
    if files.is_empty() {
        return Err(SpeechBridgeError::Media(format!(
            "No audio files found in {}",
            input_dir.display()
        )));
    }
    info!(count = files.len(), dir = %input_dir.display(), "Transcribing directory");

    let converted_dir = input_dir.join("converted");
    let mut summary = BatchSummary {
        total: files.len(),
        ..BatchSummary::default()
    };
    let mut rows = Vec::with_capacity(files.len());

    for path in &files {
        let original_name = file_name(path);
        let original_format = convert::extension(path).unwrap_or_default();
        let locale = languages::language_from_filename(&original_name);

        let wav_path = if convert {
            match convert::ensure_wav(path, &converted_dir).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(file = %original_name, %e, "Conversion failed");
                    summary.failed += 1;
                    rows.push(row(&original_name, locale, format!("[Error: {e}]"), &original_format));
                    continue;
                }
            }
        } else {
            path.clone()
        };

        let transcript = match tokio::fs::read(&wav_path).await {
            Ok(audio) => match stt.transcribe(&audio, locale).await {
                Ok(Recognition::Recognized(text)) => {
                    summary.succeeded += 1;
                    text
                }
                Ok(Recognition::NoMatch) => {
                    summary.skipped += 1;
                    NO_SPEECH.to_string()
                }
                Err(e) => {
                    warn!(file = %original_name, %e, "Transcription failed");
                    summary.failed += 1;
                    format!("[Error: {e}]")
                }
            },
            Err(e) => {
                summary.failed += 1;
                format!("[Error: {e}]")
            }
        };

        info!(file = %original_name, locale, "Transcribed");
        rows.push(row(&file_name(&wav_path), locale, transcript, &original_format));
    }

    if let Some(parent) = output_csv.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut writer = csv::Writer::from_path(output_csv)?;
    for r in &rows {
        writer.serialize(r)?;
    }
    writer.flush()?;
    summary.output = Some(output_csv.to_path_buf());
    Ok(summary)
}

fn row(filename: &str, locale: &str, transcript: String, original_format: &str) -> TranscriptRow {
    TranscriptRow {
        filename: filename.to_string(),
        language: locale.to_string(),
        language_name: languages::language_name(languages::base_code(locale)).to_string(),
        transcript,
        original_format: original_format.to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read the rows of a transcript CSV written by [`transcribe_directory`].
pub fn read_transcripts(path: &Path) -> Result<Vec<TranscriptRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<_, _>>()?;
    Ok(rows)
}

/// Translate every usable row of a transcript CSV.
///
/// Writes one `translation_<filename>_<row>.json` per row plus
/// `translated_transcripts.csv`. Rows with empty or placeholder transcripts are
/// skipped; a row whose translation fails is kept with an `error` column.
pub async fn translate_transcripts(
    translator: &dyn Translator,
    input_csv: &Path,
    targets: &[String],
    layout: &OutputLayout,
) -> Result<BatchSummary> {
    let rows = read_transcripts(input_csv)?;
    if rows.is_empty() {
        return Err(SpeechBridgeError::Translation(format!(
            "No transcripts found in {}",
            input_csv.display()
        )));
    }

    tokio::fs::create_dir_all(layout.translations_dir()).await?;
    let mut summary = BatchSummary {
        total: rows.len(),
        ..BatchSummary::default()
    };
    let mut out_rows: Vec<(Vec<String>, Option<String>)> = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let transcript = row.transcript.trim();
        if transcript.is_empty() || is_placeholder(transcript) {
            info!(file = %row.filename, transcript, "Skipping");
            summary.skipped += 1;
            continue;
        }

        let source = languages::base_code(&row.language);
        let mut fields = vec![
            row.filename.clone(),
            row.language.clone(),
            transcript.to_string(),
        ];

        match translator.translate(transcript, targets, Some(source)).await {
            Ok(translation) => {
                let record = TranslationRecord {
                    original_text: transcript.to_string(),
                    source_language: translation.detected_language,
                    translations: translation.translations,
                    timestamp: chrono::Utc::now(),
                };
                let id = format!("{}_{}", row.filename, idx + 1);
                let path = layout.save_translation(&record, Some(&id)).await?;
                info!(file = %row.filename, saved = %path.display(), "Translated");

                fields.push(record.source_language.clone());
                fields.push(
                    record
                        .timestamp
                        .with_timezone(&chrono::Local)
                        .format(CSV_TIMESTAMP)
                        .to_string(),
                );
                fields.extend(
                    targets
                        .iter()
                        .map(|t| record.translations.get(t).cloned().unwrap_or_default()),
                );
                summary.succeeded += 1;
                out_rows.push((fields, None));
            }
            Err(e) => {
                warn!(file = %row.filename, %e, "Translation failed");
                fields.push(String::new());
                fields.push(chrono::Local::now().format(CSV_TIMESTAMP).to_string());
                fields.extend(targets.iter().map(|_| String::new()));
                summary.failed += 1;
                out_rows.push((fields, Some(e.to_string())));
            }
        }
    }

    if out_rows.is_empty() {
        return Ok(summary);
    }

    let with_errors = out_rows.iter().any(|(_, err)| err.is_some());
    let mut header: Vec<String> = [
        "filename",
        "source_language",
        "original_text",
        "detected_language",
        "timestamp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(targets.iter().map(|t| format!("translation_{t}")));
    if with_errors {
        header.push("error".into());
    }

    let output = layout.translated_csv();
    let mut writer = csv::Writer::from_path(&output)?;
    writer.write_record(&header)?;
    for (mut fields, err) in out_rows {
        if with_errors {
            fields.push(err.unwrap_or_default());
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;

    summary.output = Some(output);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::fakes::{EchoStt, TagTranslator};

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder("[No speech detected]"));
        assert!(is_placeholder("[Error: boom]"));
        assert!(!is_placeholder("[partial"));
        assert!(!is_placeholder("hello"));
    }

    #[tokio::test]
    async fn test_transcribe_directory_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("samples");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("te_greeting.wav"), "namaskaram").unwrap();
        std::fs::write(input.join("silence.wav"), "").unwrap();
        std::fs::write(input.join("z_broken.wav"), "boom").unwrap();
        std::fs::write(input.join("notes.txt"), "ignored").unwrap();

        let out = dir.path().join("transcripts").join("transcripts.csv");
        let summary = transcribe_directory(&EchoStt, &input, &out, false)
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["filename", "language", "language_name", "transcript", "original_format"]
        );
        let rows: Vec<TranscriptRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].filename, "silence.wav");
        assert_eq!(rows[0].transcript, NO_SPEECH);
        assert_eq!(rows[1].language, "te-IN");
        assert_eq!(rows[1].language_name, "Telugu");
        assert_eq!(rows[1].transcript, "namaskaram");
        assert_eq!(rows[1].original_format, "wav");
        assert!(rows[2].transcript.starts_with("[Error:"));
        assert_eq!(read_transcripts(&out).unwrap(), rows);
    }

    #[tokio::test]
    async fn test_transcribe_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("t.csv");
        assert!(
            transcribe_directory(&EchoStt, dir.path(), &out, false)
                .await
                .is_err()
        );
    }

    fn write_transcripts(path: &Path, rows: &[TranscriptRow]) {
        let mut writer = csv::Writer::from_path(path).unwrap();
        for r in rows {
            writer.serialize(r).unwrap();
        }
        writer.flush().unwrap();
    }

    fn transcript_row(filename: &str, language: &str, transcript: &str) -> TranscriptRow {
        TranscriptRow {
            filename: filename.into(),
            language: language.into(),
            language_name: String::new(),
            transcript: transcript.into(),
            original_format: "wav".into(),
        }
    }

    #[tokio::test]
    async fn test_translate_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("transcripts.csv");
        write_transcripts(
            &input,
            &[
                transcript_row("a.wav", "hi-IN", "namaste"),
                transcript_row("b.wav", "en-US", "[No speech detected]"),
                transcript_row("c.wav", "en-US", "  "),
                transcript_row("d.wav", "en-US", "hello"),
            ],
        );
        let layout = OutputLayout::new(dir.path().join("out"));
        let translator = TagTranslator::default();
        let targets = vec!["es".to_string(), "fr".to_string()];

        let summary = translate_transcripts(&translator, &input, &targets, &layout)
            .await
            .unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);

        // Source language is the locale's base code
        let calls = translator.calls.lock().unwrap().clone();
        assert_eq!(calls[0], ("namaste".to_string(), Some("hi".to_string())));

        assert!(layout.translations_dir().join("translation_a.wav_1.json").exists());
        assert!(layout.translations_dir().join("translation_d.wav_4.json").exists());

        let mut reader = csv::Reader::from_path(summary.output.unwrap()).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            vec![
                "filename",
                "source_language",
                "original_text",
                "detected_language",
                "timestamp",
                "translation_es",
                "translation_fr"
            ]
        );
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[0], "a.wav");
        assert_eq!(&first[3], "hi");
        assert_eq!(&first[5], "namaste [es]");
    }

    #[tokio::test]
    async fn test_translate_failure_adds_error_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("transcripts.csv");
        write_transcripts(
            &input,
            &[
                transcript_row("ok.wav", "en-US", "fine"),
                transcript_row("bad.wav", "en-US", "reject me"),
            ],
        );
        let layout = OutputLayout::new(dir.path());
        let translator = TagTranslator {
            fail_on: HashSet::from(["reject me".to_string()]),
            ..TagTranslator::default()
        };
        let targets = vec!["de".to_string()];

        let summary = translate_transcripts(&translator, &input, &targets, &layout)
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);

        let mut reader = csv::Reader::from_path(layout.translated_csv()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(6), Some("error"));
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&records[0][6], "");
        assert!(records[1][6].contains("rejected"));
        assert_eq!(&records[1][5], "");
    }
}
