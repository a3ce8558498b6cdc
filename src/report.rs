use std::io::{self, Write};
use std::path::Path;

/// Variable the app reads the refresh token from
pub const REFRESH_TOKEN_ENV_VAR: &str = "EXPO_PUBLIC_YOUTUBE_REFRESH_TOKEN";

const RULE: &str = "============================================================";

pub fn prompt(out: &mut impl Write, auth_url: &str) -> io::Result<()> {
    writeln!(out, "🌐 Opening browser for authentication...")?;
    writeln!(out, "📝 Authorize the app to access your YouTube account")?;
    writeln!(out)?;
    writeln!(out, "If the browser does not open, visit this URL:")?;
    writeln!(out, "{}", auth_url)?;
    writeln!(out)?;
    out.flush()
}

pub fn refresh_token(out: &mut impl Write, token: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "✅ REFRESH TOKEN OBTAINED SUCCESSFULLY!")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "Add this line to your .env file:")?;
    writeln!(out)?;
    writeln!(out, "{}={}", REFRESH_TOKEN_ENV_VAR, token)?;
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "⚠️ IMPORTANT:")?;
    writeln!(out, "• The refresh token is permanent (until it is revoked)")?;
    writeln!(out, "• Do not share this token publicly")?;
    writeln!(out, "• Keep the .env file out of version control")?;
    writeln!(out)?;
    out.flush()
}

pub fn missing_refresh_token(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "⚠️ WARNING: No refresh token received!")?;
    writeln!(out, "You may need to authorize the app again.")?;
    writeln!(
        out,
        "Remove the app's access at https://myaccount.google.com/permissions and rerun this tool."
    )?;
    out.flush()
}

pub fn missing_client_secret(out: &mut impl Write, path: &Path) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    writeln!(out)?;
    writeln!(out, "❌ ERROR: File '{}' not found!", file_name)?;
    writeln!(out)?;
    writeln!(out, "How to get it:")?;
    writeln!(out, "1. Go to https://console.cloud.google.com/")?;
    writeln!(out, "2. Credentials > OAuth 2.0 Client ID")?;
    writeln!(out, "3. Click your Client ID")?;
    writeln!(out, "4. Click 'Download JSON'")?;
    writeln!(out, "5. Rename the file to '{}'", file_name)?;
    writeln!(out, "6. Place it at {}", path.display())?;
    out.flush()
}

pub fn failure(out: &mut impl Write, error: &dyn std::error::Error) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "❌ ERROR: {}", error)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn token_line_is_printed_verbatim() {
        let token = "1//0gAbC-dEf_GhI/jKl+mN=";
        let text = render(|out| refresh_token(out, token));
        let lines: Vec<_> = text
            .lines()
            .filter(|line| line.starts_with(REFRESH_TOKEN_ENV_VAR))
            .collect();
        assert_eq!(lines, vec![format!("{}={}", REFRESH_TOKEN_ENV_VAR, token)]);
    }

    #[test]
    fn remediation_names_the_expected_file() {
        let text = render(|out| missing_client_secret(out, Path::new("client_secret.json")));
        assert!(text.contains("File 'client_secret.json' not found"));
        assert!(text.contains("Rename the file to 'client_secret.json'"));
        assert!(text.contains("console.cloud.google.com"));
    }

    #[test]
    fn missing_token_warning_asks_to_reauthorize() {
        let text = render(missing_refresh_token);
        assert!(text.contains("No refresh token received"));
        assert!(text.contains("authorize the app again"));
    }

    #[test]
    fn prompt_shows_the_consent_url() {
        let text = render(|out| prompt(out, "https://accounts.example.com/auth?x=1"));
        assert!(text.lines().any(|l| l == "https://accounts.example.com/auth?x=1"));
    }
}
