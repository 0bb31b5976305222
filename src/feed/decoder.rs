use crate::model::{Channel, RoundEvent};

use super::types::FeedItem;

/// Classic channel: announces the id of the round being played.
pub const CMD_CLASSIC_SESSION: i64 = 1008;
/// Classic channel: dice result for the announced round.
pub const CMD_CLASSIC_RESULT: i64 = 1003;
/// MD5 channel: round id and dice in one item.
pub const CMD_MD5_RESULT: i64 = 2006;

/// Turns raw feed items into round events for one channel.
///
/// The classic channel splits a round across two commands, so the announced
/// id is carried over between polls until a dice result consumes it.
#[derive(Debug, Clone)]
pub struct RoundDecoder {
    channel: Channel,
    pending_round_id: Option<u64>,
}

impl RoundDecoder {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            pending_round_id: None,
        }
    }

    pub fn pending_round_id(&self) -> Option<u64> {
        self.pending_round_id
    }

    /// Events in feed order. Items missing a die or an id are dropped.
    pub fn decode(&mut self, items: &[FeedItem]) -> Vec<RoundEvent> {
        match self.channel {
            Channel::Classic => self.decode_classic(items),
            Channel::Md5 => decode_md5(items),
        }
    }

    fn decode_classic(&mut self, items: &[FeedItem]) -> Vec<RoundEvent> {
        if let Some(sid) = items
            .iter()
            .filter(|item| item.cmd == CMD_CLASSIC_SESSION)
            .filter_map(|item| item.sid)
            .last()
        {
            self.pending_round_id = Some(sid);
        }

        let mut out = Vec::new();
        for item in items.iter().filter(|item| item.cmd == CMD_CLASSIC_RESULT) {
            let (Some(round_id), Some((d1, d2, d3))) = (self.pending_round_id, item.dice()) else {
                continue;
            };
            out.push(RoundEvent::new(round_id, d1, d2, d3));
            self.pending_round_id = None;
        }
        out
    }
}

fn decode_md5(items: &[FeedItem]) -> Vec<RoundEvent> {
    items
        .iter()
        .filter(|item| item.cmd == CMD_MD5_RESULT)
        .filter_map(|item| {
            let round_id = item.sid?;
            let (d1, d2, d3) = item.dice()?;
            Some(RoundEvent::new(round_id, d1, d2, d3))
        })
        .collect()
}
