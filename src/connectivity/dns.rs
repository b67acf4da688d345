//! Captive-portal DNS responder
//!
//! Answers every query with a single A record pointing at the portal
//! address, so any hostname a provisioning client resolves lands on the
//! credential form.

use std::net::Ipv4Addr;

use tokio::net::UdpSocket;

use crate::{Error, Result};

/// Answer TTL in seconds; clients should not cache the portal address long
const TTL: u32 = 60;

/// Bind the captive DNS socket.
///
/// Kept separate from [`serve`] so the caller sees a bind failure (port 53
/// needs privileges) before the provisioning session starts.
///
/// # Errors
///
/// Returns error if the socket cannot be bound.
pub async fn bind(port: u16) -> Result<UdpSocket> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .map_err(|e| Error::Provisioning(format!("captive DNS bind failed on port {port}: {e}")))
}

/// Answer queries on `socket` until the task is cancelled
pub async fn serve(socket: UdpSocket, answer: Ipv4Addr) {
    tracing::info!(%answer, "captive DNS responder listening");

    let mut buf = [0u8; 512];
    loop {
        let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
            continue;
        };
        if let Some(response) = respond(&buf[..len], answer) {
            if let Err(e) = socket.send_to(&response, peer).await {
                tracing::debug!(error = %e, "captive DNS send failed");
            }
        }
    }
}

/// Build the response for one query: the question echoed back with an A
/// record for `answer`. Returns `None` for packets that aren't plain
/// queries.
fn respond(query: &[u8], answer: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < 12 {
        return None;
    }
    // Ignore anything that is itself a response
    if query[2] & 0x80 != 0 {
        return None;
    }
    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if qdcount == 0 {
        return None;
    }

    // Walk the first question's name to find where the question ends
    let mut pos = 12;
    loop {
        let len = *query.get(pos)? as usize;
        if len == 0 {
            pos += 1;
            break;
        }
        // Compressed names don't appear in queries
        if len & 0xC0 != 0 {
            return None;
        }
        pos += 1 + len;
    }
    let question_end = pos + 4;
    if question_end > query.len() {
        return None;
    }

    let mut response = Vec::with_capacity(question_end + 16);
    response.extend_from_slice(&query[..question_end]);

    // QR + AA, preserve RD; clear opcode/rcode
    response[2] = 0x84 | (query[2] & 0x01);
    response[3] = 0x00;
    // QDCOUNT = 1, ANCOUNT = 1, NSCOUNT = ARCOUNT = 0
    response[4..6].copy_from_slice(&1u16.to_be_bytes());
    response[6..8].copy_from_slice(&1u16.to_be_bytes());
    response[8..12].copy_from_slice(&[0, 0, 0, 0]);

    // Answer: pointer to the question name, A/IN, TTL, 4-byte address
    response.extend_from_slice(&[0xC0, 0x0C]);
    response.extend_from_slice(&1u16.to_be_bytes()); // TYPE A
    response.extend_from_slice(&1u16.to_be_bytes()); // CLASS IN
    response.extend_from_slice(&TTL.to_be_bytes());
    response.extend_from_slice(&4u16.to_be_bytes());
    response.extend_from_slice(&answer.octets());

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a query for `name`, type A, class IN
    fn query_for(name: &str) -> Vec<u8> {
        let mut q = vec![
            0xAB, 0xCD, // ID
            0x01, 0x00, // RD
            0x00, 0x01, // QDCOUNT
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        for label in name.split('.') {
            q.push(label.len() as u8);
            q.extend_from_slice(label.as_bytes());
        }
        q.push(0);
        q.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        q
    }

    #[test]
    fn answers_every_name_with_portal_address() {
        let addr = Ipv4Addr::new(192, 168, 4, 1);
        for name in ["example.com", "captive.apple.com", "connectivitycheck.gstatic.com"] {
            let response = respond(&query_for(name), addr).unwrap();
            assert_eq!(&response[0..2], &[0xAB, 0xCD]); // ID echoed
            assert_eq!(response[2] & 0x80, 0x80); // QR set
            assert_eq!(u16::from_be_bytes([response[6], response[7]]), 1); // ANCOUNT
            assert_eq!(&response[response.len() - 4..], &addr.octets());
        }
    }

    #[test]
    fn answer_points_back_at_question_name() {
        let response = respond(&query_for("example.com"), Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let question_end = response.len() - 16;
        assert_eq!(&response[question_end..question_end + 2], &[0xC0, 0x0C]);
    }

    #[test]
    fn ignores_malformed_and_response_packets() {
        let addr = Ipv4Addr::new(192, 168, 4, 1);
        assert!(respond(&[0u8; 4], addr).is_none());

        let mut reply = query_for("example.com");
        reply[2] |= 0x80;
        assert!(respond(&reply, addr).is_none());

        let mut empty = query_for("example.com");
        empty[4] = 0;
        empty[5] = 0;
        assert!(respond(&empty, addr).is_none());
    }
}
