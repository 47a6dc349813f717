//! Demo file header.

use serde::{Deserialize, Serialize};

use super::{Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EventRecord, FileHeader, KindSet, Payload, Record, RecordKind};

/// Header collector options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Whether the header is collected.
    pub enabled: bool,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// The demo file header, plus the game build parsed from its directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderResult {
    /// Header fields as recorded.
    #[serde(flatten)]
    pub header: FileHeader,
    /// Build number taken from `game_directory`, 0 if absent.
    pub game_build: u32,
    /// Collector status; unsuccessful when the stream had no header.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

/// Extracts the game build from a game directory path such as
/// `/opt/dota/dota_v6559/`.
///
/// Returns 0 if the path carries no `/dota_v<digits>/` component.
///
/// # Example
///
/// ```
/// use replay_extract::collectors::game_build_from_directory;
///
/// assert_eq!(game_build_from_directory("/srv/dota_v6559/game"), 6559);
/// assert_eq!(game_build_from_directory("/srv/dota/game"), 0);
/// ```
#[must_use]
pub fn game_build_from_directory(dir: &str) -> u32 {
    const MARKER: &str = "/dota_v";
    dir.match_indices(MARKER)
        .find_map(|(pos, _)| {
            let rest = &dir[pos + MARKER.len()..];
            let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 || rest.as_bytes().get(digits) != Some(&b'/') {
                return None;
            }
            rest[..digits].parse().ok()
        })
        .unwrap_or(0)
}

#[derive(Debug, Default)]
pub(crate) struct HeaderCollector {
    header: Option<FileHeader>,
}

impl HeaderCollector {
    pub fn new(_config: &HeaderConfig) -> Self {
        Self::default()
    }
}

impl Collect for HeaderCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::FileHeader]);
    type Output = HeaderResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        if self.header.is_some() {
            return;
        }
        if let EventRecord::Message(msg) = &record.event {
            if let Payload::FileHeader(header) = &msg.payload {
                self.header = Some(header.clone());
            }
        }
    }

    fn finalize(self, _ctx: &FinalizeContext<'_>) -> HeaderResult {
        match self.header {
            Some(header) => HeaderResult {
                game_build: game_build_from_directory(&header.game_directory),
                header,
                status: CollectorStatus::ok(),
            },
            None => HeaderResult {
                status: CollectorStatus::missing("no file header in stream"),
                ..HeaderResult::default()
            },
        }
    }
}
