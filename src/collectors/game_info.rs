//! Match summary from the demo trailer.

use serde::{Deserialize, Serialize};

use super::{Collect, CollectorStatus, FinalizeContext};
use crate::entities::Reconstructor;
use crate::source::{EventRecord, FileInfo, KindSet, Payload, Record, RecordKind};

/// Game info collector options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameInfoConfig {
    /// Whether the match summary is collected.
    pub enabled: bool,
}

impl Default for GameInfoConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Match id, teams, players and draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameInfoResult {
    /// Summary fields as recorded.
    #[serde(flatten)]
    pub info: FileInfo,
    /// Collector status; unsuccessful when the stream had no trailer.
    #[serde(flatten)]
    pub status: CollectorStatus,
}

impl GameInfoResult {
    /// Picks only, in draft order.
    pub fn picks(&self) -> impl Iterator<Item = &crate::source::HeroSelect> {
        self.info.picks_bans.iter().filter(|pb| pb.is_pick)
    }

    /// Bans only, in draft order.
    pub fn bans(&self) -> impl Iterator<Item = &crate::source::HeroSelect> {
        self.info.picks_bans.iter().filter(|pb| !pb.is_pick)
    }
}

#[derive(Debug, Default)]
pub(crate) struct GameInfoCollector {
    info: Option<FileInfo>,
}

impl GameInfoCollector {
    pub fn new(_config: &GameInfoConfig) -> Self {
        Self::default()
    }
}

impl Collect for GameInfoCollector {
    const KINDS: KindSet = KindSet::of(&[RecordKind::FileInfo]);
    type Output = GameInfoResult;

    fn observe(&mut self, _entities: &Reconstructor, record: &Record) {
        if let EventRecord::Message(msg) = &record.event {
            if let Payload::FileInfo(info) = &msg.payload {
                self.info = Some(info.clone());
            }
        }
    }

    fn finalize(self, _ctx: &FinalizeContext<'_>) -> GameInfoResult {
        match self.info {
            Some(info) => GameInfoResult {
                info,
                status: CollectorStatus::ok(),
            },
            None => GameInfoResult {
                info: FileInfo::default(),
                status: CollectorStatus::missing("no file info in stream"),
            },
        }
    }
}
