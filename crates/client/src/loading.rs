//! Loading indicator text.

use std::time::Duration;

pub const LOADING_MESSAGE: &str = "Spinning up the catalog backend, please be patient";

const FRAME: Duration = Duration::from_millis(500);
const FRAMES: [&str; 4] = ["", ".", "..", "..."];

/// Ellipsis frame for the time spent loading: one more dot every 500 ms, wrapping after three.
pub fn loading_ellipsis(elapsed: Duration) -> &'static str {
    let frame = elapsed.as_millis() / FRAME.as_millis();
    FRAMES[(frame % FRAMES.len() as u128) as usize]
}

pub fn loading_line(elapsed: Duration) -> String {
    format!("{LOADING_MESSAGE} {}", loading_ellipsis(elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_every_half_second() {
        let at = |ms| loading_ellipsis(Duration::from_millis(ms));
        assert_eq!(at(0), "");
        assert_eq!(at(499), "");
        assert_eq!(at(500), ".");
        assert_eq!(at(1_200), "..");
        assert_eq!(at(1_500), "...");
        assert_eq!(at(2_000), "");
        assert_eq!(at(2_750), ".");
    }
}
