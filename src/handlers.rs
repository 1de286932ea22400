// region:    --- Imports
use crate::auction::NewAuction;
use crate::economy::Economy;
use crate::error::EconomyError;
use crate::events::NewEvent;
use crate::guild::require_member;
use crate::{AuctionId, EventId, GuildId, MemberId};
use axum::async_trait;
use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

// endregion: --- Imports

type ApiResult = Result<Json<Value>, EconomyError>;

/// Header carrying the authenticated member id, set by the session layer in front.
pub const MEMBER_HEADER: &str = "x-member-id";

// region:    --- Router
pub fn router(economy: Arc<Economy>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/members/:id/dkp", get(handle_get_balance))
        .route("/members/:id/dkp/history", get(handle_get_ledger_history))
        .route(
            "/guilds/:guild_id/events",
            post(handle_create_event).get(handle_list_events),
        )
        .route(
            "/events/:id",
            get(handle_get_event).delete(handle_delete_event),
        )
        .route("/events/:id/participate", post(handle_participate))
        .route("/events/:id/confirm", post(handle_confirm))
        .route("/events/:id/validate", post(handle_validate))
        .route(
            "/guilds/:guild_id/auctions",
            post(handle_create_auction).get(handle_list_auctions),
        )
        .route(
            "/auctions/:id",
            get(handle_get_auction).delete(handle_cancel_auction),
        )
        .route("/auctions/:id/bids", get(handle_get_bids))
        .route("/auctions/:id/bid", post(handle_bid))
        .route("/auctions/:id/buyout", post(handle_buyout))
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(economy)
}
// endregion: --- Router

// region:    --- Extractors
/// Acting member, from `x-member-id`.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub MemberId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = EconomyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(MEMBER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<MemberId>().ok())
            .map(Actor)
            .ok_or(EconomyError::Unauthenticated)
    }
}

/// `Json` whose rejections use the API error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = EconomyError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(EconomyError::InvalidBody(rejection.body_text())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub access_code: String,
}

#[derive(Debug, Deserialize)]
pub struct BidRequest {
    pub bid_amount: i64,
}
// endregion: --- Extractors

// region:    --- Ledger Handlers

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Member DKP balance
pub async fn handle_get_balance(
    State(economy): State<Arc<Economy>>,
    Path(member_id): Path<MemberId>,
) -> ApiResult {
    let balance = economy.ledger.balance(member_id).await?;
    Ok(Json(json!({ "member_id": member_id, "balance": balance })))
}

/// Member DKP history, newest first
pub async fn handle_get_ledger_history(
    State(economy): State<Arc<Economy>>,
    Path(member_id): Path<MemberId>,
) -> ApiResult {
    let entries = economy.ledger.history(member_id).await?;
    Ok(Json(json!({ "member_id": member_id, "entries": entries })))
}

// endregion: --- Ledger Handlers

// region:    --- Event Handlers

pub async fn handle_create_event(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(guild_id): Path<GuildId>,
    ApiJson(fields): ApiJson<NewEvent>,
) -> ApiResult {
    info!(
        "{:<12} --> create event guild={} by={}: {:?}",
        "Handler", guild_id, actor, fields.name
    );
    let event = economy.events.create(actor, guild_id, fields).await?;
    let summary = economy.events.summary(event.id, actor).await?;
    Ok(Json(json!({ "success": true, "event": summary })))
}

pub async fn handle_list_events(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(guild_id): Path<GuildId>,
) -> ApiResult {
    require_member(economy.directory.as_ref(), guild_id, actor).await?;
    let events = economy.events.list(guild_id, actor).await;
    Ok(Json(json!({ "success": true, "events": events })))
}

pub async fn handle_get_event(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(event_id): Path<EventId>,
) -> ApiResult {
    let event = economy.events.summary(event_id, actor).await?;
    Ok(Json(json!({ "success": true, "event": event })))
}

pub async fn handle_delete_event(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(event_id): Path<EventId>,
) -> ApiResult {
    info!("{:<12} --> delete event id={} by={}", "Handler", event_id, actor);
    economy.events.delete(event_id, actor).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn handle_participate(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(event_id): Path<EventId>,
) -> ApiResult {
    info!("{:<12} --> participate event={} member={}", "Handler", event_id, actor);
    let participation = economy.participation.signup(event_id, actor).await?;
    Ok(Json(json!({ "success": true, "participation": participation })))
}

pub async fn handle_confirm(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(event_id): Path<EventId>,
) -> ApiResult {
    info!("{:<12} --> confirm event={} member={}", "Handler", event_id, actor);
    let participation = economy.participation.confirm(event_id, actor).await?;
    Ok(Json(json!({ "success": true, "participation": participation })))
}

pub async fn handle_validate(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(event_id): Path<EventId>,
    ApiJson(request): ApiJson<ValidateRequest>,
) -> ApiResult {
    info!("{:<12} --> validate event={} member={}", "Handler", event_id, actor);
    let receipt = economy
        .attendance
        .validate(event_id, actor, &request.access_code)
        .await?;
    Ok(Json(json!({
        "success": true,
        "dkp_earned": receipt.dkp_earned,
        "total_dkp": receipt.total_dkp,
    })))
}

// endregion: --- Event Handlers

// region:    --- Auction Handlers

pub async fn handle_create_auction(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(guild_id): Path<GuildId>,
    ApiJson(fields): ApiJson<NewAuction>,
) -> ApiResult {
    info!(
        "{:<12} --> create auction guild={} by={}: {:?}",
        "Handler", guild_id, actor, fields.item_name
    );
    let auction = economy.auctions.create(actor, guild_id, fields).await?;
    let summary = economy.auctions.summary(auction.id, actor).await?;
    Ok(Json(json!({ "success": true, "auction": summary })))
}

pub async fn handle_list_auctions(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(guild_id): Path<GuildId>,
) -> ApiResult {
    require_member(economy.directory.as_ref(), guild_id, actor).await?;
    let auctions = economy.auctions.list(guild_id, actor).await;
    let user_dkp = economy.ledger.balance(actor).await?;
    Ok(Json(json!({
        "success": true,
        "auctions": auctions,
        "user_dkp": user_dkp,
    })))
}

pub async fn handle_get_auction(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult {
    let auction = economy.auctions.summary(auction_id, actor).await?;
    Ok(Json(json!({ "success": true, "auction": auction })))
}

/// Bid history
pub async fn handle_get_bids(
    State(economy): State<Arc<Economy>>,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult {
    let bids = economy.auctions.bids(auction_id).await?;
    Ok(Json(json!({ "success": true, "bids": bids })))
}

pub async fn handle_bid(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(auction_id): Path<AuctionId>,
    ApiJson(request): ApiJson<BidRequest>,
) -> ApiResult {
    info!(
        "{:<12} --> bid auction={} member={} amount={}",
        "Handler", auction_id, actor, request.bid_amount
    );
    let outcome = economy
        .bids
        .place_bid(auction_id, actor, request.bid_amount)
        .await?;
    Ok(Json(json!({ "success": true, "bid": outcome })))
}

pub async fn handle_buyout(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult {
    info!("{:<12} --> buyout auction={} member={}", "Handler", auction_id, actor);
    let receipt = economy.buyouts.buyout(auction_id, actor).await?;
    Ok(Json(json!({
        "success": true,
        "final_price": receipt.final_price,
        "total_dkp": receipt.total_dkp,
    })))
}

pub async fn handle_cancel_auction(
    State(economy): State<Arc<Economy>>,
    Actor(actor): Actor,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult {
    info!("{:<12} --> cancel auction={} by={}", "Handler", auction_id, actor);
    let auction = economy.auctions.cancel(auction_id, actor).await?;
    let summary = economy.auctions.summary(auction.id, actor).await?;
    Ok(Json(json!({ "success": true, "auction": summary })))
}

// endregion: --- Auction Handlers
