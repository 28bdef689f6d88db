//! CEA-608 character translation.
//!
//! The basic character set is ASCII with a handful of positions reassigned to
//! accented letters. Special and extended characters arrive as two-byte codes;
//! they are keyed here by `((char0 & 0x03) << 8) | char1` so the same table
//! serves both data channels.

/// Translate a character code to its display glyph.
///
/// Codes without a table entry fall through as their Unicode scalar value,
/// which covers the plain ASCII range.
pub fn translate(code: u16) -> char {
    match code {
        // Basic set reassignments
        0x2a => 'á',
        0x5c => 'é',
        0x5e => 'í',
        0x5f => 'ó',
        0x60 => 'ú',
        0x7b => 'ç',
        0x7c => '÷',
        0x7d => 'Ñ',
        0x7e => 'ñ',
        0x7f => '█',
        // Special characters (0x11x0 row)
        0x0130 => '®',
        0x0131 => '°',
        0x0132 => '½',
        0x0133 => '¿',
        0x0134 => '™',
        0x0135 => '¢',
        0x0136 => '£',
        0x0137 => '♪',
        0x0138 => 'à',
        0x0139 => '\u{a0}', // non-breaking transparent space
        0x013a => 'è',
        0x013b => 'â',
        0x013c => 'ê',
        0x013d => 'î',
        0x013e => 'ô',
        0x013f => 'û',
        // Extended Spanish/Miscellaneous
        0x0220 => 'Á',
        0x0221 => 'É',
        0x0222 => 'Ó',
        0x0223 => 'Ú',
        0x0224 => 'Ü',
        0x0225 => 'ü',
        0x0226 => '\u{2018}',
        0x0227 => '¡',
        0x0228 => '*',
        0x0229 => '\'',
        0x022a => '\u{2014}',
        0x022b => '©',
        0x022c => '℠',
        0x022d => '•',
        0x022e => '\u{201c}',
        0x022f => '\u{201d}',
        // Extended French
        0x0230 => 'À',
        0x0231 => 'Â',
        0x0232 => 'Ç',
        0x0233 => 'È',
        0x0234 => 'Ê',
        0x0235 => 'Ë',
        0x0236 => 'ë',
        0x0237 => 'Î',
        0x0238 => 'Ï',
        0x0239 => 'ï',
        0x023a => 'Ô',
        0x023b => 'Ù',
        0x023c => 'ù',
        0x023d => 'Û',
        0x023e => '«',
        0x023f => '»',
        // Extended Portuguese
        0x0320 => 'Ã',
        0x0321 => 'ã',
        0x0322 => 'Í',
        0x0323 => 'Ì',
        0x0324 => 'ì',
        0x0325 => 'Ò',
        0x0326 => 'ò',
        0x0327 => 'Õ',
        0x0328 => 'õ',
        0x0329 => '{',
        0x032a => '}',
        0x032b => '\\',
        0x032c => '^',
        0x032d => '_',
        0x032e => '|',
        0x032f => '~',
        // Extended German/Danish
        0x0330 => 'Ä',
        0x0331 => 'ä',
        0x0332 => 'Ö',
        0x0333 => 'ö',
        0x0334 => 'ß',
        0x0335 => '¥',
        0x0336 => '¤',
        0x0337 => '│',
        0x0338 => 'Å',
        0x0339 => 'å',
        0x033a => 'Ø',
        0x033b => 'ø',
        0x033c => '┌',
        0x033d => '┐',
        0x033e => '└',
        0x033f => '┘',
        _ => char::from_u32(code as u32).unwrap_or('\u{fffd}'),
    }
}
