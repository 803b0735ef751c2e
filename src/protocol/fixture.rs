//! Canned build-server payloads.
//!
//! Nothing here touches the filesystem; source listings are static test
//! data.

use serde::{Deserialize, Serialize};

use crate::config::FixtureConfig;

/// Protocol version advertised by `build/initialize`.
pub const BSP_VERSION: &str = "2.0";

/// Result of `build/initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBuildResult {
    pub display_name: String,
    pub version: String,
    pub bsp_version: String,
    pub root_uri: String,
    pub capabilities: BuildServerCapabilities,
    pub data: InitializeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildServerCapabilities {
    pub language_ids: Vec<String>,
}

/// Implementation-specific initialization data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeData {
    pub index_store_path: String,
}

/// Result of `buildTarget/sources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesResult {
    pub items: Vec<SourcesItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesItem {
    pub target: BuildTargetIdentifier,
    pub sources: Vec<SourceItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildTargetIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub uri: String,
    pub kind: SourceItemKind,
    pub generated: bool,
}

/// Source entry kind, written as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SourceItemKind {
    File = 1,
    Directory = 2,
}

impl From<SourceItemKind> for u8 {
    fn from(kind: SourceItemKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for SourceItemKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(SourceItemKind::File),
            2 => Ok(SourceItemKind::Directory),
            other => Err(format!("unknown source item kind {other}")),
        }
    }
}

/// Targets listed by `buildTarget/sources`, as `(target, file, directory)`.
const TARGETS: &[(&str, &str, &str)] = &[
    (
        "build://target/a",
        "file:///path/to/a/file",
        "file:///path/to/a/folder/",
    ),
    (
        "build://target/b",
        "file:///path/to/b/file",
        "file:///path/to/b/folder/",
    ),
];

/// Source of fixture payloads for one session.
#[derive(Debug, Clone)]
pub struct Fixture {
    identity: FixtureConfig,
}

impl Fixture {
    pub fn new(identity: FixtureConfig) -> Self {
        Fixture { identity }
    }

    pub fn initialize_result(&self) -> InitializeBuildResult {
        InitializeBuildResult {
            display_name: self.identity.display_name.clone(),
            version: self.identity.version.clone(),
            bsp_version: BSP_VERSION.to_string(),
            root_uri: self.identity.root_uri.clone(),
            capabilities: BuildServerCapabilities {
                language_ids: self.identity.language_ids.clone(),
            },
            data: InitializeData {
                index_store_path: self.identity.index_store_path.clone(),
            },
        }
    }

    pub fn sources_result(&self) -> SourcesResult {
        let items = TARGETS
            .iter()
            .map(|&(target, file, directory)| SourcesItem {
                target: BuildTargetIdentifier {
                    uri: target.to_string(),
                },
                sources: vec![
                    SourceItem {
                        uri: file.to_string(),
                        kind: SourceItemKind::File,
                        generated: false,
                    },
                    SourceItem {
                        uri: directory.to_string(),
                        kind: SourceItemKind::Directory,
                        generated: false,
                    },
                ],
            })
            .collect();

        SourcesResult { items }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture::new(FixtureConfig::default())
    }
}
