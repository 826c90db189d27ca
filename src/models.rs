// Core data structures for the matchwatch spider

use serde::{Deserialize, Serialize};

/// Identifier of a single match as reported by the remote API.
pub type MatchId = String;

/// Gameplay queues the remote exposes for match-ID listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Siege,
    Onslaught,
    TeamDeathmatch,
    Ranked,
}

impl GameMode {
    /// Numeric queue id used in API URLs
    pub fn queue_id(&self) -> u32 {
        match self {
            GameMode::Siege => 424,
            GameMode::Onslaught => 452,
            GameMode::TeamDeathmatch => 469,
            GameMode::Ranked => 428,
        }
    }
}

impl Default for GameMode {
    fn default() -> Self {
        GameMode::Siege
    }
}

/// One player's performance in one match.
///
/// Field names on the wire follow the remote's inconsistent Pascal/camel
/// casing; the serde renames below are the single place that mapping lives.
/// Identity key is `(match_id, player_name)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(rename = "Match")]
    pub match_id: MatchId,
    #[serde(rename = "playerName")]
    pub player_name: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    #[serde(rename = "Account_Level")]
    pub account_level: i64,
    #[serde(rename = "Mastery_Level")]
    pub master_level: i64,
    #[serde(rename = "Reference_Name")]
    pub champion: String,
    #[serde(rename = "Entry_Datetime")]
    pub match_date: String,
    #[serde(rename = "Map_Game")]
    pub map: String,
    #[serde(rename = "Time_In_Match_Seconds")]
    pub match_duration: i64,
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "PartyId")]
    pub party_id: i64,
    #[serde(rename = "TaskForce")]
    pub team: i64,
    #[serde(rename = "Team1Score")]
    pub team1_score: i64,
    #[serde(rename = "Team2Score")]
    pub team2_score: i64,
    #[serde(rename = "Win_Status")]
    pub win_status: String,
    #[serde(rename = "Kills_Player")]
    pub kills: i64,
    #[serde(rename = "Deaths")]
    pub deaths: i64,
    #[serde(rename = "Assists")]
    pub assists: i64,
    #[serde(rename = "Killing_Spree")]
    pub streak: i64,
    #[serde(rename = "Multi_kill_Max")]
    pub highest_multi_kill: i64,
    #[serde(rename = "Objective_Assists")]
    pub objective_time: i64,
    #[serde(rename = "Damage_Player")]
    pub damage_dealt: i64,
    #[serde(rename = "Damage_Taken")]
    pub damage_taken: i64,
    #[serde(rename = "Damage_Mitigated")]
    pub shielding: i64,
    #[serde(rename = "Healing")]
    pub healing: i64,
    #[serde(rename = "Healing_Player_Self")]
    pub self_healing: i64,
    #[serde(rename = "Gold_Earned")]
    pub credits: i64,
    #[serde(rename = "Item_Purch_1")]
    pub loadout_card1: String,
    #[serde(rename = "Item_Purch_2")]
    pub loadout_card2: String,
    #[serde(rename = "Item_Purch_3")]
    pub loadout_card3: String,
    #[serde(rename = "Item_Purch_4")]
    pub loadout_card4: String,
    #[serde(rename = "Item_Purch_5")]
    pub loadout_card5: String,
    #[serde(rename = "ItemLevel1")]
    pub loadout_card1_level: i64,
    #[serde(rename = "ItemLevel2")]
    pub loadout_card2_level: i64,
    #[serde(rename = "ItemLevel3")]
    pub loadout_card3_level: i64,
    #[serde(rename = "ItemLevel4")]
    pub loadout_card4_level: i64,
    #[serde(rename = "ItemLevel5")]
    pub loadout_card5_level: i64,
    #[serde(rename = "Item_Purch_6")]
    pub talent: String,
    #[serde(rename = "Item_Active_1")]
    pub item1: String,
    #[serde(rename = "Item_Active_2")]
    pub item2: String,
    #[serde(rename = "Item_Active_3")]
    pub item3: String,
    #[serde(rename = "Item_Active_4")]
    pub item4: String,
    #[serde(rename = "ActiveLevel1")]
    pub item1_level: i64,
    #[serde(rename = "ActiveLevel2")]
    pub item2_level: i64,
    #[serde(rename = "ActiveLevel3")]
    pub item3_level: i64,
    #[serde(rename = "ActiveLevel4")]
    pub item4_level: i64,
}

/// Remote-reported request usage, surfaced for observability only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataUsage {
    #[serde(rename = "Total_Requests_Today")]
    pub total_requests_today: i64,
    #[serde(rename = "Total_Sessions_Today")]
    pub total_sessions_today: i64,
    #[serde(rename = "Active_Sessions")]
    pub active_sessions: i64,
    #[serde(rename = "Request_Limit_Daily")]
    pub request_limit_daily: i64,
    #[serde(rename = "Session_Cap")]
    pub session_cap: i64,
}
