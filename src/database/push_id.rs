use rand::Rng;

/// The 64-symbol push-ID alphabet, chosen so byte-wise string order matches
/// base-64 digit order.
pub(crate) const PUSH_CHARS: &[u8; 64] =
    b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Per-instance generator state for Firebase push IDs.
///
/// A push ID is 20 characters: an 8-character base-64 encoding of the
/// generation time in milliseconds, followed by 12 base-64 digits of
/// randomness. Because the timestamp leads, IDs generated at different times
/// sort chronologically; within a single millisecond the random suffix is
/// incremented instead of redrawn, so consecutive IDs still sort in
/// generation order.
///
/// State is owned per `Database` instance, never global, so independent
/// clients stay collision-safe and tests can drive the clock directly.
#[derive(Debug, Default)]
pub(crate) struct PushIdState {
    last_push_time: u64,
    last_rand_chars: [u8; 12],
}

impl PushIdState {
    /// Produces the next push ID for the given wall-clock time in
    /// milliseconds since the epoch.
    pub(crate) fn next_id(&mut self, mut now: u64) -> String {
        let duplicate_time = now == self.last_push_time;
        self.last_push_time = now;

        let mut timestamp_chars = [0u8; 8];
        for slot in timestamp_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(now % 64) as usize];
            now /= 64;
        }

        if duplicate_time {
            // Same millisecond: take the lexicographic successor of the
            // previous suffix, treating it as a 12-digit big-endian base-64
            // counter. If all twelve digits are at 63 the counter wraps to
            // all zero and ordering is lost for that one ID; this matches
            // the reference behavior and would need ~64^12 IDs in one
            // millisecond to trigger.
            for digit in self.last_rand_chars.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            let mut rng = rand::thread_rng();
            for digit in self.last_rand_chars.iter_mut() {
                *digit = rng.gen_range(0..64);
            }
        }

        let mut id = String::with_capacity(20);
        id.extend(timestamp_chars.iter().map(|&c| c as char));
        id.extend(
            self.last_rand_chars
                .iter()
                .map(|&d| PUSH_CHARS[d as usize] as char),
        );

        id
    }
}
