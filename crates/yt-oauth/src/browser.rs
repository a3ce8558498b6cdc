use crate::{AuthError, Result};

/// Something that can show the consent page to the user
pub trait Browser {
    /// Open `url`, returning once the page has been handed off
    fn open(&self, url: &str) -> Result<()>;
}

/// The user's default web browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        webbrowser::open(url).map_err(|e| AuthError::Browser(e.to_string()))
    }
}

/// Leaves the URL for the user to open by hand
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBrowser;

impl Browser for NoBrowser {
    fn open(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}
