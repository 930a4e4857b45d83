use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use legal_aid_service::{AppConfig, LegalAssistant, PipelineDeps, telemetry::init_tracing};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scenario {
    UnpaidOvertime,
    LandlordMold,
    IceEncounter,
    DomesticViolence,
}

impl Scenario {
    fn query(self) -> &'static str {
        match self {
            Scenario::UnpaidOvertime => {
                "My boss hasn't paid me overtime for the last 3 months. I work 50 hours per week as a \
                 server at a restaurant in Boston. They only pay me regular hourly rate."
            }
            Scenario::LandlordMold => {
                "There's black mold growing in my bathroom and bedroom. I told my landlord 3 weeks ago \
                 in writing but they haven't fixed it. The lease says they're responsible for repairs."
            }
            Scenario::IceEncounter => {
                "I'm an international student on F-1 visa. I'm worried about ICE enforcement in my area. \
                 What are my rights if approached by immigration officers?"
            }
            Scenario::DomesticViolence => {
                "My partner physically attacked me and is threatening me. I'm scared and don't know \
                 what to do. I need help immediately."
            }
        }
    }
}

/// Run the legal assistant once and print the result as JSON
#[derive(Debug, Parser)]
#[command(name = "ask", version)]
struct Args {
    /// Describe the legal situation
    #[arg(short, long, conflicts_with = "scenario")]
    query: Option<String>,

    /// City and state, e.g. "Boston, MA"
    #[arg(short, long, default_value = "Boston, MA")]
    location: String,

    /// Use a built-in demo situation instead of --query
    #[arg(short, long, value_enum)]
    scenario: Option<Scenario>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let query = match (args.query, args.scenario) {
        (Some(query), _) if !query.trim().is_empty() => query,
        (_, Some(scenario)) => scenario.query().to_string(),
        _ => bail!("provide --query or --scenario"),
    };

    let config = AppConfig::from_env()?;
    let deps = PipelineDeps::from_config(&config).await?;
    let result = LegalAssistant::new(&deps).run(&query, &args.location).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
