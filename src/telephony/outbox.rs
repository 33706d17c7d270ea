use tracing::{error, info};

use super::{Channel, Telephony};
use crate::logging::anon_hash;
use crate::metrics;

/// Send a text on the channel the user wrote in. Failures are logged and
/// counted, never returned.
pub async fn deliver(
    telephony: &dyn Telephony,
    channel: Channel,
    to: &str,
    body: &str,
) -> Option<String> {
    let res = match channel {
        Channel::WhatsApp => telephony.send_whatsapp(to, body, None).await,
        _ => telephony.send_sms(to, body, None).await,
    };
    match res {
        Ok(sid) => {
            metrics::record_outbound(true);
            info!(
                to = %anon_hash(to),
                channel = channel.as_str(),
                message_sid = %sid,
                "message_sent"
            );
            Some(sid)
        }
        Err(e) => {
            metrics::record_outbound(false);
            error!(
                to = %anon_hash(to),
                channel = channel.as_str(),
                error = %e,
                "message_send_failed"
            );
            None
        }
    }
}
