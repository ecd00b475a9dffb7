use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

/// Well-known install locations probed before falling back to `PATH`
const FFMPEG_CANDIDATES: &[&str] = &[
    "/opt/homebrew/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/usr/bin/ffmpeg",
];

/// Resolved locations of the ffmpeg and ffprobe executables
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl FfmpegTools {
    /// Locate ffmpeg, preferring an explicitly configured path
    pub fn locate(configured: Option<&Path>) -> Self {
        let ffmpeg = configured
            .map(Path::to_path_buf)
            .or_else(|| {
                FFMPEG_CANDIDATES
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| is_executable(candidate))
            })
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));

        let ffprobe = match ffmpeg.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join("ffprobe"),
            _ => PathBuf::from("ffprobe"),
        };

        debug!("Using ffmpeg at {:?}, ffprobe at {:?}", ffmpeg, ffprobe);
        Self { ffmpeg, ffprobe }
    }

    pub fn ffmpeg_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run ffmpeg to completion, returning stderr on failure
    pub fn run_ffmpeg(&self, args: &[String]) -> Result<(), String> {
        run_command(&self.ffmpeg, args).map(|_| ())
    }

    /// Run ffprobe to completion, returning its stdout
    pub fn run_ffprobe(&self, args: &[String]) -> Result<String, String> {
        run_command(&self.ffprobe, args)
    }
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn run_command(program: &Path, args: &[String]) -> Result<String, String> {
    debug!("Running {:?} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("failed to spawn {}: {}", program.display(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} exited with {}: {}", program.display(), output.status, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse an ffprobe rational such as `30000/1001` or a plain decimal
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let value = value.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse().ok()?,
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Map a 0-100 quality setting onto the x264 CRF scale
pub fn quality_to_crf(quality: u8) -> u8 {
    (51 - ((quality.min(100) as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        let ntsc = parse_frame_rate("30000/1001\n").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("N/A"), None);
        assert_eq!(parse_frame_rate("-5"), None);
    }

    #[test]
    fn test_quality_to_crf() {
        assert_eq!(quality_to_crf(100), 0);
        assert_eq!(quality_to_crf(0), 51);
        assert!(quality_to_crf(85) < 10);
    }

    #[test]
    fn test_configured_path_wins() {
        let tools = FfmpegTools::locate(Some(Path::new("/opt/tools/ffmpeg")));
        assert_eq!(tools.ffmpeg, PathBuf::from("/opt/tools/ffmpeg"));
        assert_eq!(tools.ffprobe, PathBuf::from("/opt/tools/ffprobe"));
    }

    #[test]
    fn test_bare_name_probes_path() {
        let tools = FfmpegTools::locate(Some(Path::new("ffmpeg")));
        assert_eq!(tools.ffprobe, PathBuf::from("ffprobe"));
    }
}
