// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP implementation of [`MatchApi`] against the Riot match-v5 API.
//!
//! Shape translation only: HTTP status and body are mapped into [`ApiError`]
//! and the domain types. Throttling, timeouts and retries live in
//! [`super::RateLimitedGateway`].

use super::{ApiError, MatchApi};
use crate::model::{MatchRecord, Participant, PlayerRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Platforms are grouped into regional routing clusters for match-v5.
fn regional_base(platform: &str) -> &'static str {
    match platform.to_ascii_lowercase().as_str() {
        "na1" | "br1" | "la1" | "la2" => "https://americas.api.riotgames.com",
        "kr" | "jp1" => "https://asia.api.riotgames.com",
        "oc1" | "ph2" | "sg2" | "th2" | "tw2" | "vn2" => "https://sea.api.riotgames.com",
        // euw1, eun1, tr1, ru and anything unknown route through Europe.
        _ => "https://europe.api.riotgames.com",
    }
}

pub struct RiotHttpClient {
    http: reqwest::Client,
    api_key: String,
    /// Queue filter applied to the id listing, when set (420 = ranked solo).
    queue_filter: Option<u32>,
}

impl RiotHttpClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            // Belt-and-braces; the gateway wraps every call in its own timeout.
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Transient(format!("http client init: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            queue_filter: None,
        })
    }

    #[must_use]
    pub fn with_queue_filter(mut self, queue_id: u32) -> Self {
        self.queue_filter = Some(queue_id);
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .header("X-Riot-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("request failed: {e}")))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Malformed(format!("decode failed: {e}"))),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(ApiError::Throttled { retry_after })
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(url.to_string())),
            status if status.is_server_error() => {
                Err(ApiError::Transient(format!("upstream status {status}")))
            }
            status => Err(ApiError::Malformed(format!("unexpected status {status}"))),
        }
    }
}

#[async_trait]
impl MatchApi for RiotHttpClient {
    async fn recent_match_ids(
        &self,
        player: &PlayerRef,
        limit: usize,
    ) -> Result<Vec<String>, ApiError> {
        let mut url = format!(
            "{}/lol/match/v5/matches/by-puuid/{}/ids?start=0&count={}",
            regional_base(&player.region),
            player.puuid,
            limit
        );
        if let Some(queue) = self.queue_filter {
            url.push_str(&format!("&queue={queue}"));
        }
        self.get_json(&url).await
    }

    async fn match_detail(
        &self,
        match_id: &str,
    ) -> Result<(MatchRecord, Vec<Participant>), ApiError> {
        // Match ids are prefixed with their platform (EUW1_...), which picks
        // the routing cluster.
        let platform = match_id.split('_').next().unwrap_or_default();
        let url = format!(
            "{}/lol/match/v5/matches/{}",
            regional_base(platform),
            match_id
        );
        let dto: MatchDto = self.get_json(&url).await?;
        dto.try_into()
    }
}

// Wire shapes, trimmed to the fields this crate consumes.

#[derive(Debug, Deserialize)]
struct MatchDto {
    metadata: MetadataDto,
    info: InfoDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataDto {
    match_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfoDto {
    game_start_timestamp: i64,
    game_duration: i64,
    queue_id: u32,
    game_mode: String,
    participants: Vec<ParticipantDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantDto {
    puuid: String,
    champion_id: i32,
    champion_name: String,
    #[serde(default)]
    team_position: String,
    team_id: u16,
    kills: u32,
    deaths: u32,
    assists: u32,
    total_minions_killed: u32,
    #[serde(default)]
    neutral_minions_killed: u32,
    gold_earned: u32,
    total_damage_dealt_to_champions: u32,
    vision_score: u32,
    win: bool,
}

impl TryFrom<MatchDto> for (MatchRecord, Vec<Participant>) {
    type Error = ApiError;

    fn try_from(dto: MatchDto) -> Result<Self, ApiError> {
        let game_start: DateTime<Utc> = DateTime::from_timestamp_millis(dto.info.game_start_timestamp)
            .ok_or_else(|| {
                ApiError::Malformed(format!(
                    "bad gameStartTimestamp {} in {}",
                    dto.info.game_start_timestamp, dto.metadata.match_id
                ))
            })?;
        let duration_secs = u32::try_from(dto.info.game_duration.max(0)).unwrap_or(u32::MAX);

        let record = MatchRecord {
            match_id: dto.metadata.match_id,
            game_start,
            duration_secs,
            queue_id: dto.info.queue_id,
            game_mode: dto.info.game_mode,
        };
        let participants = dto
            .info
            .participants
            .into_iter()
            .map(|p| Participant {
                puuid: p.puuid,
                champion_id: p.champion_id,
                champion_name: p.champion_name,
                role: p.team_position,
                team_id: p.team_id,
                kills: p.kills,
                deaths: p.deaths,
                assists: p.assists,
                creep_score: p.total_minions_killed + p.neutral_minions_killed,
                gold_earned: p.gold_earned,
                damage_to_champions: p.total_damage_dealt_to_champions,
                vision_score: p.vision_score,
                win: p.win,
            })
            .collect();
        Ok((record, participants))
    }
}
