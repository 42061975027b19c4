//! Callout icon lookup
//!
//! Icons map many-to-one onto a fixed set of callout kinds. Anything not
//! in the table, including a missing icon, is `info`.

/// Kind used when the icon is missing or unknown
pub const DEFAULT_KIND: &str = "info";

/// Icon glyph (without variation selector) to callout kind
const ICON_KINDS: &[(&str, &str)] = &[
    ("\u{1f4a1}", "tip"),       // light bulb
    ("\u{2139}", "info"),       // information
    ("\u{1f4dd}", "note"),      // memo
    ("\u{270f}", "note"),       // pencil
    ("\u{1f5d2}", "note"),      // spiral notepad
    ("\u{1f4cc}", "important"), // pushpin
    ("\u{2705}", "success"),    // check mark button
    ("\u{2714}", "success"),    // check mark
    ("\u{2611}", "todo"),       // ballot box with check
    ("\u{2753}", "question"),   // question mark
    ("\u{1f914}", "question"),  // thinking face
    ("\u{26a0}", "warning"),    // warning sign
    ("\u{1f6a7}", "warning"),   // construction
    ("\u{274c}", "failure"),    // cross mark
    ("\u{2757}", "danger"),     // exclamation mark
    ("\u{203c}", "danger"),     // double exclamation mark
    ("\u{1f6a8}", "danger"),    // police light
    ("\u{26d4}", "danger"),     // no entry
    ("\u{1f6d1}", "danger"),    // stop sign
    ("\u{1f41b}", "bug"),       // bug
    ("\u{1f4d6}", "example"),   // open book
    ("\u{1f4ac}", "quote"),     // speech balloon
];

/// Callout kind for an icon glyph
pub fn callout_kind(icon: Option<&str>) -> &'static str {
    let Some(icon) = icon else {
        return DEFAULT_KIND;
    };
    let glyph = icon.trim().trim_end_matches('\u{fe0f}');

    ICON_KINDS
        .iter()
        .find(|(candidate, _)| *candidate == glyph)
        .map(|(_, kind)| *kind)
        .unwrap_or(DEFAULT_KIND)
}
