use anyhow::Result;
use console::style;
use tutor::client::TutorClient;
use tutor::errors::{needs_setup, ClientError};
use tutor::practice::{Difficulty, PracticeStats, DEFAULT_TOPIC};
use tutor::store::{JsonFileStore, PRACTICE_STATS_KEY};

use crate::render::{print_markdown, print_setup_guidance};

#[derive(Debug, PartialEq, Eq)]
enum Reply {
    Hint,
    Skip,
    Answer(String),
}

fn parse_reply(input: &str) -> Reply {
    let input = input.trim();
    if input.is_empty() {
        Reply::Skip
    } else if input == "?" || input.eq_ignore_ascii_case("hint") {
        Reply::Hint
    } else {
        Reply::Answer(input.to_string())
    }
}

fn report(err: ClientError) -> anyhow::Error {
    if needs_setup(&err.to_string()) {
        print_setup_guidance();
    }
    err.into()
}

pub async fn run(
    client: TutorClient,
    store: &mut JsonFileStore,
    topic: Option<String>,
    difficulty: Difficulty,
) -> Result<()> {
    let mut stats: PracticeStats = store.get(PRACTICE_STATS_KEY)?.unwrap_or_default();
    let topic_name = topic.clone().unwrap_or_else(|| DEFAULT_TOPIC.to_string());

    cliclack::intro(style(format!(" practice: {} ({}) ", topic_name, difficulty)).on_cyan().black())?;

    loop {
        let spin = cliclack::spinner();
        spin.start("Writing a problem...");
        let problem = match client.generate_problem(topic.as_deref(), difficulty).await {
            Ok(problem) => {
                spin.stop("Problem ready");
                problem
            }
            Err(e) => {
                spin.error("Could not get a problem");
                return Err(report(e));
            }
        };
        print_markdown(&problem.problem)?;
        println!();

        let answer = loop {
            let input: String = cliclack::input("Your answer (? for a hint, empty to skip)")
                .required(false)
                .interact()?;
            match parse_reply(&input) {
                Reply::Hint if problem.hint.is_empty() => {
                    let _ = cliclack::log::info("No hint for this one");
                }
                Reply::Hint => {
                    let _ = cliclack::log::info(format!("Hint: {}", problem.hint));
                }
                Reply::Skip => break None,
                Reply::Answer(answer) => break Some(answer),
            }
        };

        match answer {
            None => {
                let _ = cliclack::log::remark(format!("Answer: {}", problem.answer));
            }
            Some(answer) => {
                let spin = cliclack::spinner();
                spin.start("Checking...");
                let grade = match client
                    .check_answer(&problem.problem, &answer, &problem.answer)
                    .await
                {
                    Ok(grade) => grade,
                    Err(e) => {
                        spin.error("Could not check the answer");
                        return Err(report(e));
                    }
                };

                stats.record(&topic_name, grade.correct);
                store.set(PRACTICE_STATS_KEY, &stats)?;

                if grade.correct {
                    spin.stop(style(format!("Correct! Streak: {}", stats.streak)).green());
                } else {
                    spin.stop(style("Not quite").red());
                }
                print_markdown(&grade.explanation)?;
                println!();
                if !grade.correct {
                    let _ = cliclack::log::remark(format!("Answer: {}", problem.answer));
                }
            }
        }

        if !cliclack::confirm("Another problem?")
            .initial_value(true)
            .interact()?
        {
            break;
        }
    }

    cliclack::outro(format!(
        "{} of {} correct overall",
        stats.correct, stats.attempted
    ))?;
    Ok(())
}
