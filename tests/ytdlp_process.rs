//! Drives the real `YtDlp` adapter against a shell script that speaks
//! just enough of yt-dlp's command line.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vidgrab::{DownloadManager, MediaTool, ToolError, YtDlp};

const FAKE_YTDLP: &str = r#"#!/bin/sh
out=""
fmt=""
url=""
prev=""
for arg in "$@"; do
  case "$prev" in
    -o) out="$arg" ;;
    -f) fmt="$arg" ;;
  esac
  prev="$arg"
  url="$arg"
done

case "$url" in
  *unsupported*)
    echo "WARNING: [generic] Falling back on generic information extractor" >&2
    echo "ERROR: Unsupported URL: $url" >&2
    exit 1 ;;
  *garbage*)
    echo "this is not json"
    exit 0 ;;
  *slow*)
    sleep 5
    exit 0 ;;
esac

for arg in "$@"; do
  if [ "$arg" = "--dump-json" ]; then
    printf '{"title":"Sample","duration":12.5,"uploader":"someone","formats":['
    printf '{"format_id":"sb0","vcodec":"none","acodec":"none"},'
    printf '{"format_id":"18","ext":"mp4","resolution":"640x360","vcodec":"avc1","acodec":"mp4a"}]}\n'
    exit 0
  fi
done

ext="mp4"
[ -n "$fmt" ] && ext="webm"
printf '%s' "$fmt" > "$(dirname "$out")/selector.txt"
file=$(printf '%s' "$out" | sed "s/%(ext)s/$ext/")
printf 'media' > "$file"
"#;

fn install_fake(dir: &Path) -> PathBuf {
    let path = dir.join("yt-dlp");
    std::fs::write(&path, FAKE_YTDLP).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// One test per binary: writing an executable while another test thread
// forks can leave it busy (ETXTBSY).
#[tokio::test]
async fn ytdlp_adapter_end_to_end() {
    let bin_dir = tempfile::tempdir().unwrap();
    let dl_dir = tempfile::tempdir().unwrap();
    let tool = YtDlp::new(install_fake(bin_dir.path()));

    // metadata
    let info = tool.fetch_info("https://v.example/ok").await.unwrap();
    assert_eq!(info.title.as_deref(), Some("Sample"));
    assert_eq!(info.formats.len(), 2);
    assert!(!info.formats[0].has_media());

    // stderr reason
    let err = tool
        .fetch_info("https://unsupported.example")
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::Failed { .. }));
    assert_eq!(
        err.reason().as_deref(),
        Some("Unsupported URL: https://unsupported.example")
    );

    // unparsable output
    let err = tool.fetch_info("https://garbage.example").await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidOutput(_)));

    // best: no selector passed, file lands under the reserved prefix
    let manager = DownloadManager::new(dl_dir.path(), Duration::from_secs(3600));
    let file = manager
        .download(&tool, "https://v.example/ok", Some("best"))
        .await
        .unwrap();
    assert!(file.filename.starts_with("video_"));
    assert!(file.filename.ends_with(".mp4"));
    assert!(file.path.is_file());
    let selector = std::fs::read_to_string(dl_dir.path().join("selector.txt")).unwrap();
    assert_eq!(selector, "");

    // explicit format gets the fallback chain
    let file = manager
        .download(&tool, "https://v.example/ok", Some("251"))
        .await
        .unwrap();
    assert!(file.filename.ends_with(".webm"));
    let selector = std::fs::read_to_string(dl_dir.path().join("selector.txt")).unwrap();
    assert_eq!(selector, "251/bestvideo+bestaudio/best");

    // timeout
    let impatient = tool.clone().with_timeout(Some(Duration::from_millis(200)));
    let err = impatient.fetch_info("https://slow.example").await.unwrap_err();
    assert!(matches!(err, ToolError::TimedOut(_)));
}
