//! Dev-server framework profiles

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How to start a framework's dev server and recognise it is up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkProfile {
    /// Command run inside the session directory
    pub command: String,
    /// Case-insensitive stdout substrings meaning "ready"; empty means
    /// ready as soon as the process has started
    #[serde(default)]
    pub ready_markers: Vec<String>,
}

impl FrameworkProfile {
    pub fn new(command: impl Into<String>, ready_markers: &[&str]) -> Self {
        Self {
            command: command.into(),
            ready_markers: ready_markers.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Profiles for the common frontend and node frameworks
pub fn builtin_profiles() -> BTreeMap<String, FrameworkProfile> {
    let vite_markers = ["ready in", "local:"];

    [
        (
            "react",
            FrameworkProfile::new(
                "npm start",
                &["compiled successfully", "webpack compiled", "local:"],
            ),
        ),
        ("vite", FrameworkProfile::new("npm run dev", &vite_markers)),
        (
            "vue",
            FrameworkProfile::new("npm run dev", &["ready in", "local:", "app running at"]),
        ),
        (
            "next",
            FrameworkProfile::new("npm run dev", &["ready", "started server on", "local:"]),
        ),
        (
            "angular",
            FrameworkProfile::new(
                "npx ng serve",
                &["compiled successfully", "development server is listening"],
            ),
        ),
        ("svelte", FrameworkProfile::new("npm run dev", &vite_markers)),
        (
            "express",
            FrameworkProfile::new(
                "node server.js",
                &["listening on", "server running", "started on port"],
            ),
        ),
        (
            "static",
            FrameworkProfile::new("npx serve .", &["accepting connections", "serving!", "local:"]),
        ),
    ]
    .into_iter()
    .map(|(name, profile)| (name.to_string(), profile))
    .collect()
}
