//! Cross-thread message channels.
//!
//! The Bluedroid GAP callback runs on the BT task and the bootstrap code
//! runs on the main task; neither may touch the detection state directly.
//! They push messages into these static `embassy-sync` channels, which the
//! runtime's dispatch loop drains on its own thread.
//!
//! Scan completions travel on their own channel. Advertisements arrive in
//! bursts and may be dropped when the dispatch loop falls behind; a lost
//! completion would leave the scan machine waiting forever.
//!
//! ```text
//! ┌──────────────┐  ScanCompletion  ┌──────────────────┐
//! │ GAP callback │─────────────────▶│                  │
//! │              │  AdvRecord       │  dispatch loop   │
//! │              │─────────────────▶│  (runtime task)  │
//! └──────────────┘                  │                  │
//! ┌──────────────┐  AppCommand      │                  │
//! │ any thread   │─────────────────▶│                  │
//! └──────────────┘                  └──────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::commands::AppCommand;
use crate::beacon::AdvRecord;
use crate::fsm::ScanCompletion;

/// At most one radio operation is in flight, so a handful of slots
/// never fills.
const COMPLETION_DEPTH: usize = 4;

/// Scan results arrive every few milliseconds while the tag is nearby.
pub const ADV_DEPTH: usize = 16;

const COMMAND_DEPTH: usize = 4;

pub static COMPLETION_CHANNEL: Channel<CriticalSectionRawMutex, ScanCompletion, COMPLETION_DEPTH> =
    Channel::new();

pub static ADV_CHANNEL: Channel<CriticalSectionRawMutex, AdvRecord, ADV_DEPTH> = Channel::new();

pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, AppCommand, COMMAND_DEPTH> =
    Channel::new();

/// Post a radio completion. Returns `false` if the channel was full.
pub fn push_completion(done: ScanCompletion) -> bool {
    COMPLETION_CHANNEL.try_send(done).is_ok()
}

/// Post a scan result without blocking. Returns `false` if the channel
/// was full and the record was dropped.
pub fn push_advertisement(record: AdvRecord) -> bool {
    ADV_CHANNEL.try_send(record).is_ok()
}

/// Queue a command without blocking. Returns `false` if the channel was
/// full and the command was dropped.
pub fn push_command(cmd: AppCommand) -> bool {
    COMMAND_CHANNEL.try_send(cmd).is_ok()
}
