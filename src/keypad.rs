//! Maps the left-hand side of a QWERTY keyboard onto the 16-key hex pad.
//!
//! ```text
//! 1 2 3 4        1 2 3 C
//! Q W E R   ->   4 5 6 D
//! A S D F        7 8 9 E
//! Z X C V        A 0 B F
//! ```

/// (keyboard char, hex key) pairs in pad order.
pub const KEYMAP: [(char, u8); 16] = [
    ('1', 0x1),
    ('2', 0x2),
    ('3', 0x3),
    ('4', 0xC),
    ('q', 0x4),
    ('w', 0x5),
    ('e', 0x6),
    ('r', 0xD),
    ('a', 0x7),
    ('s', 0x8),
    ('d', 0x9),
    ('f', 0xE),
    ('z', 0xA),
    ('x', 0x0),
    ('c', 0xB),
    ('v', 0xF),
];

/// The hex key for a keyboard character, ignoring case.
pub fn key_for_char(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    KEYMAP.iter().find(|(k, _)| *k == c).map(|&(_, key)| key)
}

/// The keyboard character bound to hex key `key`.
pub fn char_for_key(key: u8) -> Option<char> {
    KEYMAP.iter().find(|(_, k)| *k == key).map(|&(c, _)| c)
}
