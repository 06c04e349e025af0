//! A1-style cell references (1-based rows and columns)

/// Last row of an .xlsx worksheet
pub const MAX_ROWS: u32 = 1_048_576;
/// Last column of an .xlsx worksheet (XFD)
pub const MAX_COLS: u32 = 16_384;

/// Column number to letters: 1 → A, 27 → AA
pub fn column_letters(col: u32) -> String {
    let mut result = String::new();
    let mut num = col;

    while num > 0 {
        let remainder = (num - 1) % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        num = (num - 1) / 26;
    }

    result
}

pub fn cell_name(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row)
}

/// Parse `B12` (or `$B$12`) into `(row, col)`.
pub fn parse_cell_name(name: &str) -> Option<(u32, u32)> {
    let name = name.trim().trim_start_matches('$');
    let split = name.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = name.split_at(split);
    if letters.is_empty() {
        return None;
    }

    let mut col: u32 = 0;
    for b in letters.bytes() {
        col = col
            .checked_mul(26)?
            .checked_add(u32::from(b.to_ascii_uppercase() - b'A') + 1)?;
    }

    let row: u32 = digits.trim_start_matches('$').parse().ok()?;
    if row == 0 || col > MAX_COLS || row > MAX_ROWS {
        return None;
    }
    Some((row, col))
}

/// Column part only, for references whose row is implied by the parent row.
pub fn parse_column(name: &str) -> Option<u32> {
    parse_cell_name(name).map(|(_, col)| col)
}
