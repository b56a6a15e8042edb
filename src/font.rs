use crate::style::BaseFont;
use crate::types::Pt;

// Advance widths (1/1000 em) of the base-14 Helvetica faces for U+0020..=U+007E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

const MISSING_WIDTH: u16 = 556;

fn advance(font: BaseFont, ch: char) -> u16 {
    let table = match font {
        BaseFont::Helvetica => &HELVETICA_WIDTHS,
        BaseFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
    };
    let code = ch as u32;
    if (0x20..=0x7e).contains(&code) {
        return table[(code - 0x20) as usize];
    }
    // Accented Latin-1 letters share the advance of their base letter closely enough
    // for placement purposes.
    match fold_latin1(ch) {
        Some(base) => table[(base as u32 - 0x20) as usize],
        None => MISSING_WIDTH,
    }
}

fn fold_latin1(ch: char) -> Option<char> {
    let base = match ch {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' => 'O',
        'Ù'..='Ü' => 'U',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' => 'o',
        'ù'..='ü' => 'u',
        _ => return None,
    };
    Some(base)
}

/// Width of `text` set in `font` at `font_size` points.
pub fn text_width(font: BaseFont, font_size: Pt, text: &str) -> Pt {
    let units: u32 = text.chars().map(|ch| advance(font, ch) as u32).sum();
    if units == 0 {
        return Pt::ZERO;
    }
    Pt::from_milli_i64(font_size.to_milli_i64() * units as i64 / 1000)
}
