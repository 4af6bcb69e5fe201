use std::path::Path;

use crate::core::processing::extract::ZoneStatistics;
use crate::error::Result;
use crate::types::Statistic;

/// One row per zone: `id` followed by the statistics in request order. Missing values
/// (no valid pixels) are empty cells.
pub fn write_statistics_csv(
    output: &Path,
    statistics: &[Statistic],
    rows: &[ZoneStatistics],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(output)?;
    let mut header = vec!["id".to_string()];
    header.extend(statistics.iter().map(|s| s.to_string()));
    writer.write_record(&header)?;
    for row in rows {
        let mut record = vec![row.zone_id.clone()];
        record.extend(statistics.iter().map(|stat| match row.get(*stat) {
            Some(v) if *stat == Statistic::Count || *stat == Statistic::Nodata => {
                format!("{}", v as u64)
            }
            Some(v) => v.to_string(),
            None => String::new(),
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
