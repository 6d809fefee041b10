use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::picklist::PickList;

const SHEET_NAME: &str = "Pick List";

/// Write the ranked list to an `.xlsx` file: rank, team, score, then one column per variable
/// the formula referenced.
pub fn write_picklist_xlsx(path: &Path, list: &PickList) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).context("name pick list sheet")?;

    let mut header = vec!["Rank".to_string(), "Team".to_string(), "Score".to_string()];
    header.extend(list.used_vars.iter().cloned());
    write_header(sheet, &header)?;

    for (idx, row) in list.rows.iter().enumerate() {
        let r = (idx + 1) as u32;
        sheet
            .write_number(r, 0, (idx + 1) as f64)
            .with_context(|| format!("write rank ({r},0)"))?;
        sheet
            .write_string(r, 1, &row.team)
            .with_context(|| format!("write team ({r},1)"))?;
        write_float(sheet, r, 2, row.score)?;
        for (col, name) in list.used_vars.iter().enumerate() {
            let col = (col + 3) as u16;
            if let Some(v) = row.vars.iter().find(|v| &v.name == name) {
                write_float(sheet, r, col, v.value)?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;
    Ok(())
}

fn write_header(sheet: &mut Worksheet, header: &[String]) -> Result<()> {
    for (col, value) in header.iter().enumerate() {
        sheet
            .write_string(0, col as u16, value)
            .with_context(|| format!("write header cell (0,{col})"))?;
    }
    Ok(())
}

// Spreadsheet cells cannot hold NaN or infinities.
fn write_float(sheet: &mut Worksheet, row: u32, col: u16, value: f64) -> Result<()> {
    if value.is_finite() {
        sheet
            .write_number(row, col, value)
            .with_context(|| format!("write cell ({row},{col})"))?;
    } else {
        sheet
            .write_string(row, col, "n/a")
            .with_context(|| format!("write cell ({row},{col})"))?;
    }
    Ok(())
}
