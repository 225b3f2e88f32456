//! Parsers for the `ListPlayers` and `ListSquads` command responses.
//!
//! Rows that do not have a known shape (headers, separators, blank lines) are skipped.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::protocol::classifier::{capture, capture_opt};
use crate::protocol::event::{DisconnectedPlayer, Player, PlayerList, Squad};

static PLAYER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ID: (\d+) \| Online IDs: EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))? \| Name: (.+?) \| Team ID: (\d+|N/A) \| Squad ID: (\d+|N/A) \| Is Leader: (True|False) \| Role: (.*)$",
    )
    .expect("valid regex")
});
static DISCONNECTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ID: (\d+) \| Online IDs: EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))? \| Since Disconnect: (\S+) \| Name: (.*)$",
    )
    .expect("valid regex")
});
static TEAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Team ID: (\d+) \((.+)\)$").expect("valid regex"));
static SQUAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^ID: (\d+) \| Name: (.+?) \| Size: (\d+) \| Locked: (True|False) \| Creator Name: (.+?) \| Creator Online IDs: EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?$",
    )
    .expect("valid regex")
});

fn not_applicable(value: String) -> Option<String> {
    (value != "N/A").then_some(value)
}

/// Parse a `ListPlayers` response
pub fn parse_players(response: &str) -> PlayerList {
    let mut list = PlayerList::default();

    for line in response.lines().map(str::trim) {
        if let Some(caps) = PLAYER_RE.captures(line) {
            list.online.push(Player {
                id: capture(&caps, 1),
                eos_id: capture(&caps, 2),
                steam_id: capture_opt(&caps, 3),
                name: capture(&caps, 4),
                team_id: not_applicable(capture(&caps, 5)),
                squad_id: not_applicable(capture(&caps, 6)),
                is_leader: &caps[7] == "True",
                role: capture(&caps, 8),
            });
        } else if let Some(caps) = DISCONNECTED_RE.captures(line) {
            list.disconnected.push(DisconnectedPlayer {
                id: capture(&caps, 1),
                eos_id: capture(&caps, 2),
                steam_id: capture_opt(&caps, 3),
                since_disconnect: capture(&caps, 4),
                name: capture(&caps, 5),
            });
        }
    }

    list
}

/// Parse a `ListSquads` response
///
/// Squad rows inherit the team from the nearest `Team ID:` header above them.
pub fn parse_squads(response: &str) -> Vec<Squad> {
    let mut squads = Vec::new();
    let mut team: Option<(String, String)> = None;

    for line in response.lines().map(str::trim) {
        if let Some(caps) = TEAM_RE.captures(line) {
            team = Some((capture(&caps, 1), capture(&caps, 2)));
            continue;
        }

        let Some(caps) = SQUAD_RE.captures(line) else {
            continue;
        };
        let Ok(size) = caps[3].parse() else {
            debug!(size = &caps[3], "Skipping squad row with unreadable size");
            continue;
        };
        let (team_id, team_name) = team.clone().unwrap_or_default();
        squads.push(Squad {
            id: capture(&caps, 1),
            team_id,
            team_name,
            name: capture(&caps, 2),
            size,
            locked: &caps[4] == "True",
            creator_name: capture(&caps, 5),
            creator_eos_id: capture(&caps, 6),
            creator_steam_id: capture_opt(&caps, 7),
        });
    }

    squads
}
