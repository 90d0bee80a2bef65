use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::model::{Goal, GoalStatus, Milestone, NewGoal, NewMilestone, Profile, VisionBoardImage};
use crate::session::Session;

const VISION_BUCKET: &str = "vision-board";
const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Synchronous client for the hosted backend: GoTrue auth under `/auth/v1`,
/// PostgREST tables under `/rest/v1`, object storage under `/storage/v1`.
/// Every table query is scoped to the signed-in user; row-level filtering
/// beyond that lives server-side.
#[derive(Debug)]
pub struct Backend {
    base_url: String,
    anon_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

impl Backend {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let base_url = cfg.backend_url()?;
        let anon_key = cfg.anon_key()?;
        let http = Client::builder()
            .build()
            .context("failed to build http client")?;

        debug!(base_url = %base_url, "constructed backend client");
        Ok(Self {
            base_url,
            anon_key,
            http,
        })
    }

    // -- auth --------------------------------------------------------------

    #[instrument(skip(self, password))]
    pub fn sign_up(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .context("sign-up request failed")?;

        let token: TokenResponse = read_json(check(resp)?)?;
        info!(user_id = %token.user.id, "signed up");
        Ok(session_from_token(token, Utc::now()))
    }

    #[instrument(skip(self, password))]
    pub fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .context("sign-in request failed")?;

        let token: TokenResponse = read_json(check(resp)?)?;
        info!(user_id = %token.user.id, "signed in");
        Ok(session_from_token(token, Utc::now()))
    }

    #[instrument(skip(self, refresh_token))]
    pub fn refresh(&self, refresh_token: &str) -> anyhow::Result<Session> {
        let url = format!(
            "{}/auth/v1/token?grant_type=refresh_token",
            self.base_url
        );
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .context("session refresh request failed")?;

        let token: TokenResponse = read_json(check(resp)?)?;
        info!(user_id = %token.user.id, "refreshed session");
        Ok(session_from_token(token, Utc::now()))
    }

    // -- profile -----------------------------------------------------------

    #[instrument(skip(self, session))]
    pub fn fetch_profile(&self, session: &Session) -> anyhow::Result<Option<Profile>> {
        let id_filter = eq(session.user_id);
        let resp = self
            .rest_get(session, "profiles")
            .query(&[("select", "*"), ("id", id_filter.as_str())])
            .send()
            .context("profile fetch request failed")?;

        let mut rows: Vec<Profile> = read_json(check(resp)?)?;
        Ok(rows.pop())
    }

    // -- goals -------------------------------------------------------------

    #[instrument(skip(self, session))]
    pub fn list_goals(&self, session: &Session) -> anyhow::Result<Vec<Goal>> {
        let user_filter = eq(session.user_id);
        let resp = self
            .rest_get(session, "goals")
            .query(&[
                ("select", "*,milestones(*)"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .context("goal list request failed")?;

        let goals: Vec<Goal> = read_json(check(resp)?)?;
        debug!(count = goals.len(), "fetched goals");
        Ok(goals)
    }

    #[instrument(skip(self, session), fields(goal_id = %goal_id))]
    pub fn fetch_goal(&self, session: &Session, goal_id: Uuid) -> anyhow::Result<Goal> {
        let id_filter = eq(goal_id);
        let user_filter = eq(session.user_id);
        let resp = self
            .rest_get(session, "goals")
            .query(&[
                ("select", "*,milestones(*)"),
                ("id", id_filter.as_str()),
                ("user_id", user_filter.as_str()),
            ])
            .send()
            .context("goal fetch request failed")?;

        let mut rows: Vec<Goal> = read_json(check(resp)?)?;
        let mut goal = rows
            .pop()
            .ok_or_else(|| anyhow!("goal not found: {goal_id}"))?;
        goal.milestones.sort_by_key(|m| m.order_index);
        Ok(goal)
    }

    #[instrument(skip(self, session, new_goal), fields(title = %new_goal.title))]
    pub fn create_goal(&self, session: &Session, new_goal: &NewGoal) -> anyhow::Result<Goal> {
        let resp = self
            .rest_post(session, "goals")
            .json(&[new_goal])
            .send()
            .context("goal insert request failed")?;

        let mut rows: Vec<Goal> = read_json(check(resp)?)?;
        let goal = rows
            .pop()
            .ok_or_else(|| anyhow!("goal insert returned no row"))?;
        info!(goal_id = %goal.id, "created goal");
        Ok(goal)
    }

    #[instrument(skip(self, session), fields(goal_id = %goal_id, status = ?status))]
    pub fn set_goal_status(
        &self,
        session: &Session,
        goal_id: Uuid,
        status: GoalStatus,
    ) -> anyhow::Result<()> {
        let resp = self
            .rest_patch(session, "goals")
            .query(&[("id", &eq(goal_id)), ("user_id", &eq(session.user_id))])
            .json(&serde_json::json!({ "status": status }))
            .send()
            .context("goal status update request failed")?;

        check(resp)?;
        info!("updated goal status");
        Ok(())
    }

    #[instrument(skip(self, session), fields(goal_id = %goal_id))]
    pub fn delete_goal(&self, session: &Session, goal_id: Uuid) -> anyhow::Result<()> {
        let resp = self
            .rest_delete(session, "goals")
            .query(&[("id", &eq(goal_id)), ("user_id", &eq(session.user_id))])
            .send()
            .context("goal delete request failed")?;

        check(resp)?;
        info!("deleted goal");
        Ok(())
    }

    // -- milestones --------------------------------------------------------

    #[instrument(skip(self, session), fields(goal_id = %goal_id))]
    pub fn list_milestones(
        &self,
        session: &Session,
        goal_id: Uuid,
    ) -> anyhow::Result<Vec<Milestone>> {
        let goal_filter = eq(goal_id);
        let resp = self
            .rest_get(session, "milestones")
            .query(&[
                ("select", "*"),
                ("goal_id", goal_filter.as_str()),
                ("order", "order_index.asc"),
            ])
            .send()
            .context("milestone list request failed")?;

        read_json(check(resp)?)
    }

    #[instrument(skip(self, session, new_milestone), fields(goal_id = %new_milestone.goal_id))]
    pub fn create_milestone(
        &self,
        session: &Session,
        new_milestone: &NewMilestone,
    ) -> anyhow::Result<Milestone> {
        let resp = self
            .rest_post(session, "milestones")
            .json(&[new_milestone])
            .send()
            .context("milestone insert request failed")?;

        let mut rows: Vec<Milestone> = read_json(check(resp)?)?;
        let milestone = rows
            .pop()
            .ok_or_else(|| anyhow!("milestone insert returned no row"))?;
        info!(milestone_id = %milestone.id, "created milestone");
        Ok(milestone)
    }

    #[instrument(skip(self, session), fields(milestone_id = %milestone_id))]
    pub fn set_milestone_completed(
        &self,
        session: &Session,
        milestone_id: Uuid,
        completed: bool,
    ) -> anyhow::Result<()> {
        let resp = self
            .rest_patch(session, "milestones")
            .query(&[("id", &eq(milestone_id))])
            .json(&serde_json::json!({ "completed": completed }))
            .send()
            .context("milestone update request failed")?;

        check(resp)?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(milestone_id = %milestone_id))]
    pub fn delete_milestone(&self, session: &Session, milestone_id: Uuid) -> anyhow::Result<()> {
        let resp = self
            .rest_delete(session, "milestones")
            .query(&[("id", &eq(milestone_id))])
            .send()
            .context("milestone delete request failed")?;

        check(resp)?;
        Ok(())
    }

    // -- vision board ------------------------------------------------------

    #[instrument(skip(self, session))]
    pub fn list_vision_images(&self, session: &Session) -> anyhow::Result<Vec<VisionBoardImage>> {
        let user_filter = eq(session.user_id);
        let resp = self
            .rest_get(session, "vision_board_images")
            .query(&[
                ("select", "*"),
                ("user_id", user_filter.as_str()),
                ("order", "created_at.desc"),
            ])
            .send()
            .context("vision board list request failed")?;

        read_json(check(resp)?)
    }

    #[instrument(skip(self, session, image_url))]
    pub fn add_vision_image(
        &self,
        session: &Session,
        image_url: &str,
    ) -> anyhow::Result<VisionBoardImage> {
        let resp = self
            .rest_post(session, "vision_board_images")
            .json(&[serde_json::json!({
                "user_id": session.user_id,
                "image_url": image_url,
            })])
            .send()
            .context("vision board insert request failed")?;

        let mut rows: Vec<VisionBoardImage> = read_json(check(resp)?)?;
        rows.pop()
            .ok_or_else(|| anyhow!("vision board insert returned no row"))
    }

    #[instrument(skip(self, session), fields(image_id = %image_id))]
    pub fn delete_vision_image(&self, session: &Session, image_id: Uuid) -> anyhow::Result<()> {
        let resp = self
            .rest_delete(session, "vision_board_images")
            .query(&[("id", &eq(image_id)), ("user_id", &eq(session.user_id))])
            .send()
            .context("vision board delete request failed")?;

        check(resp)?;
        Ok(())
    }

    /// Uploads image bytes to the vision-board bucket and returns the public
    /// URL for the stored object.
    #[instrument(skip(self, session, bytes), fields(object = %object_path, size = bytes.len()))]
    pub fn upload_vision_object(
        &self,
        session: &Session,
        object_path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<String> {
        let url = format!(
            "{}/storage/v1/object/{VISION_BUCKET}/{object_path}",
            self.base_url
        );
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, bearer(session))
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .context("storage upload request failed")?;

        check(resp)?;
        info!("uploaded vision board object");
        Ok(public_object_url(&self.base_url, object_path))
    }

    /// Best-effort removal of the stored object behind a deleted row; a
    /// failure here is logged, not propagated, matching the row being the
    /// source of truth.
    #[instrument(skip(self, session), fields(object = %object_path))]
    pub fn delete_vision_object(&self, session: &Session, object_path: &str) {
        let url = format!(
            "{}/storage/v1/object/{VISION_BUCKET}/{object_path}",
            self.base_url
        );
        let result = self
            .http
            .delete(url)
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, bearer(session))
            .send();

        match result.map_err(anyhow::Error::from).and_then(check) {
            Ok(_) => debug!("removed vision board object"),
            Err(err) => {
                warn!(error = %err, "failed to remove vision board object");
            }
        }
    }

    // -- request plumbing --------------------------------------------------

    fn rest_get(&self, session: &Session, table: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .get(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, bearer(session))
    }

    fn rest_post(&self, session: &Session, table: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .post(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, bearer(session))
            .header("Prefer", "return=representation")
    }

    fn rest_patch(&self, session: &Session, table: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .patch(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, bearer(session))
    }

    fn rest_delete(&self, session: &Session, table: &str) -> reqwest::blocking::RequestBuilder {
        self.http
            .delete(self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header(AUTHORIZATION, bearer(session))
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }
}

fn bearer(session: &Session) -> String {
    format!("Bearer {}", session.access_token)
}

fn eq<T: std::fmt::Display>(value: T) -> String {
    format!("eq.{value}")
}

fn check(resp: Response) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    let detail = if body.trim().is_empty() {
        String::new()
    } else {
        format!(": {}", body.trim())
    };
    Err(anyhow!("backend returned {status}{detail}"))
}

fn read_json<T: serde::de::DeserializeOwned>(resp: Response) -> anyhow::Result<T> {
    resp.json().context("failed to parse backend response")
}

fn session_from_token(token: TokenResponse, now: DateTime<Utc>) -> Session {
    // GoTrue usually reports expires_at directly; older versions only send
    // expires_in.
    let expires_at = token
        .expires_at
        .or_else(|| token.expires_in.map(|secs| now.timestamp() + secs))
        .unwrap_or_else(|| now.timestamp() + 3600);

    Session {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at,
        user_id: token.user.id,
        email: token.user.email,
    }
}

/// Objects live at `<user_id>/<upload-millis>.<ext>` inside the bucket.
pub fn vision_object_path(user_id: Uuid, now: DateTime<Utc>, extension: &str) -> String {
    format!("{user_id}/{}.{extension}", now.timestamp_millis())
}

pub fn public_object_url(base_url: &str, object_path: &str) -> String {
    format!("{base_url}/storage/v1/object/public/{VISION_BUCKET}/{object_path}")
}

/// Recovers the bucket-relative object path from a stored public URL, so a
/// deleted row can also drop its object. Returns None for foreign URLs.
pub fn object_path_from_url(image_url: &str) -> Option<String> {
    let parts: Vec<&str> = image_url.split('/').collect();
    let bucket_index = parts.iter().position(|part| *part == VISION_BUCKET)?;
    let rest = &parts[bucket_index + 1..];
    if rest.is_empty() {
        return None;
    }
    Some(rest.join("/"))
}

/// Local pre-flight for uploads: only image files, capped at 10 MB.
pub fn validate_image_upload(file_name: &str, size: u64) -> anyhow::Result<(String, String)> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or_else(|| anyhow!("file has no extension: {file_name}"))?;

    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        other => return Err(anyhow!("not an image file: .{other}")),
    };

    if size > MAX_IMAGE_BYTES {
        return Err(anyhow!(
            "image is {size} bytes; the limit is {MAX_IMAGE_BYTES} (10 MB)"
        ));
    }

    Ok((extension, content_type.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;
    use uuid::Uuid;

    use super::{
        AuthUser, TokenResponse, object_path_from_url, public_object_url, session_from_token,
        validate_image_upload, vision_object_path,
    };

    #[test]
    fn token_without_expires_at_uses_expires_in() {
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        let token = TokenResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: None,
            expires_in: Some(900),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: None,
            },
        };

        let session = session_from_token(token, now);
        assert_eq!(session.expires_at, now.timestamp() + 900);
    }

    #[test]
    fn object_paths_round_trip_through_public_urls() {
        let user_id = Uuid::new_v4();
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid now");

        let path = vision_object_path(user_id, now, "png");
        assert_eq!(path, format!("{user_id}/{}.png", now.timestamp_millis()));

        let url = public_object_url("https://example.supabase.co", &path);
        assert_eq!(object_path_from_url(&url).expect("path"), path);
    }

    #[test]
    fn foreign_urls_yield_no_object_path() {
        assert!(object_path_from_url("https://example.com/cat.png").is_none());
    }

    #[test]
    fn upload_validation_checks_type_and_size() {
        let (ext, content_type) =
            validate_image_upload("board.PNG", 1024).expect("valid upload");
        assert_eq!(ext, "png");
        assert_eq!(content_type, "image/png");

        assert!(validate_image_upload("notes.txt", 10).is_err());
        assert!(validate_image_upload("noext", 10).is_err());
        assert!(validate_image_upload("big.jpg", 11 * 1024 * 1024).is_err());
    }
}
