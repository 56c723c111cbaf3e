//! Rules command CLI handler.

use pgsql_migrator::profile::Database;

pub fn run(database: Database, json: bool) -> anyhow::Result<()> {
    let profile = database.profile();
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print!("{}", profile.to_yaml()?);
    }
    Ok(())
}
