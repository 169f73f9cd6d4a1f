use anyhow::Result;
use console::style;
use tutor::practice::PracticeStats;
use tutor::store::{JsonFileStore, PRACTICE_STATS_KEY};

fn percent(accuracy: f32) -> u32 {
    (accuracy * 100.0).round() as u32
}

pub fn format_stats(stats: &PracticeStats) -> Vec<String> {
    if stats.attempted == 0 {
        return vec!["No practice answers graded yet.".to_string()];
    }

    let mut lines = vec![
        format!(
            "{} of {} correct ({}%)",
            stats.correct,
            stats.attempted,
            percent(stats.accuracy())
        ),
        format!("Streak: {} (best {})", stats.streak, stats.best_streak),
    ];
    for (topic, counts) in &stats.by_topic {
        lines.push(format!(
            "  {:<16} {:>3}/{:<3} {:>3}%",
            topic,
            counts.correct,
            counts.attempted,
            percent(counts.accuracy())
        ));
    }
    lines
}

pub fn run(store: &JsonFileStore) -> Result<()> {
    let stats: PracticeStats = store.get(PRACTICE_STATS_KEY)?.unwrap_or_default();
    println!("{}", style("Practice statistics").bold());
    for line in format_stats(&stats) {
        println!("{}", line);
    }
    Ok(())
}
