//! Test fixtures: analysis routine stand-ins and sample assets

#![allow(dead_code)]

use std::io::Cursor;

pub const FAKE_VERDICT: &str = "此影片是偽造影片";
pub const REAL_VERDICT: &str = "此影片是真實影片";

/// Routine that always classifies the asset as a forgery.
pub fn fake_verdict_script() -> String {
    format!(r#"echo '{{"result":"{}"}}'"#, FAKE_VERDICT)
}

/// Routine that answers "real" for images and "fake" for everything else,
/// keyed on the asset path it receives.
pub fn extension_script() -> String {
    format!(
        r#"case "$1" in *.png|*.jpg) echo '{{"result":"{real}"}}' ;; *) echo '{{"result":"{fake}"}}' ;; esac"#,
        real = REAL_VERDICT,
        fake = FAKE_VERDICT
    )
}

/// Routine that crashes before printing anything.
pub const CRASHING_SCRIPT: &str = "echo 'CUDA out of memory' >&2; exit 2";

/// Routine that prints the "unsupported file" marker instead of JSON.
pub const GARBAGE_SCRIPT: &str = "echo wrong";

/// Routine that answers "real" after a second.
pub const SLOW_VERDICT_SCRIPT: &str = r#"sleep 1; echo '{"result":"此影片是真實影片"}'"#;

/// Routine that answers with the pending marker instead of a verdict.
pub const SENTINEL_VERDICT_SCRIPT: &str = r#"echo '{"result":"Pending"}'"#;

/// Routine that never finishes on its own.
pub const HANGING_SCRIPT: &str = "sleep 30";

/// Bytes standing in for an mp4 upload; the stand-in routines never decode them.
pub fn mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypmp42");
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

/// A real 4x4 PNG so content sniffing accepts it.
pub fn png_bytes() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::new(4, 4)
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png fixture");
    out.into_inner()
}
