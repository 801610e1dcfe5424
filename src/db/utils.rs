use chrono::{DateTime, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};

/// Request ids look like `DEP-1698400000000-k3j9x`.
pub fn generate_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("{}-{}-{}", prefix.to_uppercase(), Utc::now().timestamp_millis(), suffix)
}

pub fn within_dates(at: DateTime<Utc>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    let day = at.date_naive();
    from.map_or(true, |from| day >= from) && to.map_or(true, |to| day <= to)
}
