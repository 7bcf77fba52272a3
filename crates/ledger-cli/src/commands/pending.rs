use crate::commands::common::{format_record_lines, record_to_list_item, Context, RecordListItem};
use crate::error::CliError;

pub async fn run_pending(as_json: bool, ctx: &Context) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let records = store.query_unsynced().await?;

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No pending records.");
        return Ok(());
    }

    for line in format_record_lines(&records) {
        println!("{line}");
    }
    Ok(())
}
