//! Read-only JSON endpoints. Field names match the legacy Vietnamese payload.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;

use crate::channel::{ChannelSnapshot, SNAPSHOT_HISTORY_LEN};
use crate::model::RoundRecord;
use crate::predictor::{Prediction, PredictionDetails};

const PLACEHOLDER: &str = "Chưa có";

#[derive(Clone)]
pub struct ApiState {
    pub classic: watch::Receiver<ChannelSnapshot>,
    pub md5: watch::Receiver<ChannelSnapshot>,
    pub source_tag: Arc<str>,
    pub placeholder_tag: Arc<str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionView {
    #[serde(rename = "Ket_qua_du_doan")]
    pub label: &'static str,
    #[serde(rename = "Do_tin_cay")]
    pub confidence: String,
    #[serde(rename = "Phuong_phap")]
    pub method: String,
    #[serde(rename = "Thong_tin_bo_sung")]
    pub details: PredictionDetails,
}

impl From<&Prediction> for PredictionView {
    fn from(p: &Prediction) -> Self {
        Self {
            label: p.label.as_vietnamese(),
            confidence: format!("{}%", p.confidence_percent()),
            method: p.method.to_string(),
            details: p.details.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    #[serde(rename = "Phien")]
    pub round_id: u64,
    #[serde(rename = "Xuc_xac_1")]
    pub die1: u8,
    #[serde(rename = "Xuc_xac_2")]
    pub die2: u8,
    #[serde(rename = "Xuc_xac_3")]
    pub die3: u8,
    #[serde(rename = "Tong")]
    pub total: u32,
    #[serde(rename = "Ket_qua")]
    pub result: String,
    #[serde(rename = "TX_Pattern")]
    pub pattern: String,
    #[serde(rename = "Du_doan")]
    pub next: String,
    pub id: String,
    #[serde(rename = "Du_doan_chi_tiet", skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionView>,
}

impl RoundView {
    pub fn placeholder(source_tag: &str) -> Self {
        Self {
            round_id: 0,
            die1: 0,
            die2: 0,
            die3: 0,
            total: 0,
            result: PLACEHOLDER.to_string(),
            pattern: String::new(),
            next: PLACEHOLDER.to_string(),
            id: source_tag.to_string(),
            prediction: None,
        }
    }

    pub fn from_record(record: &RoundRecord, source_tag: &str) -> Self {
        Self {
            round_id: record.round_id,
            die1: record.dice[0],
            die2: record.dice[1],
            die3: record.dice[2],
            total: record.total,
            result: record.label.as_vietnamese().to_string(),
            pattern: record.pattern.clone(),
            next: record
                .prediction
                .as_ref()
                .map(|p| p.label.as_vietnamese())
                .unwrap_or(PLACEHOLDER)
                .to_string(),
            id: source_tag.to_string(),
            prediction: record.prediction.as_ref().map(PredictionView::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub taixiu: Vec<RoundView>,
    pub taixiumd5: Vec<RoundView>,
}

/// Latest round, or the placeholder row (tagged `placeholder_tag`) before the first one.
pub fn latest_view(
    snapshot: &ChannelSnapshot,
    source_tag: &str,
    placeholder_tag: &str,
) -> RoundView {
    snapshot
        .latest
        .as_ref()
        .map(|r| RoundView::from_record(r, source_tag))
        .unwrap_or_else(|| RoundView::placeholder(placeholder_tag))
}

pub fn history_view(snapshot: &ChannelSnapshot, source_tag: &str) -> Vec<RoundView> {
    snapshot
        .recent
        .iter()
        .take(SNAPSHOT_HISTORY_LEN)
        .map(|r| RoundView::from_record(r, source_tag))
        .collect()
}

async fn latest_classic(State(state): State<ApiState>) -> Json<RoundView> {
    let snap = state.classic.borrow().clone();
    Json(latest_view(&snap, &state.source_tag, &state.placeholder_tag))
}

async fn latest_md5(State(state): State<ApiState>) -> Json<RoundView> {
    let snap = state.md5.borrow().clone();
    Json(latest_view(&snap, &state.source_tag, &state.placeholder_tag))
}

async fn history(State(state): State<ApiState>) -> Json<HistoryView> {
    let classic = state.classic.borrow().clone();
    let md5 = state.md5.borrow().clone();
    Json(HistoryView {
        taixiu: history_view(&classic, &state.source_tag),
        taixiumd5: history_view(&md5, &state.source_tag),
    })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/taixiu", get(latest_classic))
        .route("/api/taixiumd5", get(latest_md5))
        .route("/api/history", get(history))
        .with_state(state)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>TaiXiu prediction API</title>
<style>
body { font-family: Arial, sans-serif; margin: 40px; }
.endpoint { background: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 5px; }
code { background: #eee; padding: 2px 5px; }
</style>
</head>
<body>
<h1>TaiXiu prediction API</h1>
<p>Ensemble of 21 heuristic estimators plus pattern rules.</p>
<div class="endpoint"><code>GET /api/taixiu</code> latest classic round and next-round prediction</div>
<div class="endpoint"><code>GET /api/taixiumd5</code> latest MD5 round and next-round prediction</div>
<div class="endpoint"><code>GET /api/history</code> 20 most recent rounds per channel</div>
</body>
</html>
"#;
