//! Identifier generation: room codes, player ids, question ids.
//!
//! Everything draws from the engine's injected random source, so a seeded
//! engine produces the same identifiers run after run.

use hotseat_protocol::{PlayerId, QuestionId, RoomCode};
use rand::Rng;

/// Upper-case letters and digits; easy to read out loud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a room code of `len` characters (at least one) that `taken`
/// does not report as already in use.
pub fn room_code<R: Rng + ?Sized>(
    rng: &mut R,
    len: usize,
    taken: impl Fn(&RoomCode) -> bool,
) -> RoomCode {
    let len = len.max(1);
    loop {
        let code: String = (0..len)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        let code = RoomCode::new(code);
        if !taken(&code) {
            return code;
        }
        tracing::debug!(%code, "room code collision, regenerating");
    }
}

/// Generates an opaque 64-bit player id, hex encoded.
pub fn player_id<R: Rng + ?Sized>(rng: &mut R) -> PlayerId {
    PlayerId::new(hex_token(rng))
}

/// Generates a question id.
pub fn question_id<R: Rng + ?Sized>(rng: &mut R) -> QuestionId {
    QuestionId::new(format!("q-{}", hex_token(rng)))
}

fn hex_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 8] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
