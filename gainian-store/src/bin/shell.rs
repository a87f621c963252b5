use chrono::NaiveDate;
use gainian_engine::MembershipMap;
use gainian_store::{
    cleanup_older_than, list_records, select, BatchJobs, Error, ImportConfig, ImportStatus,
    Importer, LedgerFilter, Store,
};
use gainian_utils::parse_date_from_str;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> std::result::Result<(), Error> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("gainian=info"))
        .init();
    let opt = Opt::from_args();
    let cfg = match opt.config {
        Some(ref path) => ImportConfig::from_file(path)?,
        None => ImportConfig::default(),
    };
    let store = Arc::new(Store::open(
        opt.file.clone().unwrap_or_else(|| "./gainian.db".to_owned()),
        cfg.busy_timeout_ms,
    )?);
    let data_type = cfg.data_type.clone();

    match opt.cmd {
        Command::Import { input, overwrite } => {
            let importer = importer(&opt.concepts, Arc::clone(&store), cfg)?;
            let (content, filename) = read_input(&input)?;
            let outcome = importer.import(&content, &filename, overwrite)?;
            print_json(&outcome)?;
        }
        Command::Batch { input, overwrite } => {
            let importer = importer(&opt.concepts, Arc::clone(&store), cfg)?;
            let jobs = BatchJobs::new(Arc::new(importer));
            let (content, filename) = read_input(&input)?;
            let (id, handle) = jobs.submit(content, filename, overwrite);
            let result = handle
                .await
                .map_err(|e| Error::Transaction(format!("batch job {} aborted: {}", id, e)))?;
            print_json(&result)?;
        }
        Command::Ledger {
            from,
            to,
            status,
            limit,
        } => {
            let filter = LedgerFilter {
                start: parse_opt_date(from)?,
                end: parse_opt_date(to)?,
                status: match status {
                    Some(s) => Some(s.parse::<ImportStatus>()?),
                    None => None,
                },
                import_type: Some(data_type),
                limit: Some(limit),
            };
            let recs = store.read(|conn| list_records(conn, &filter))?;
            print_json(&recs)?;
        }
        Command::Summary { date } => {
            let date = parse_date_from_str(&date)?;
            let rs = store.read(|conn| select::select_summaries(conn, &data_type, date))?;
            print_json(&rs)?;
        }
        Command::Ranking { date, concept } => {
            let date = parse_date_from_str(&date)?;
            let rs = store.read(|conn| {
                select::select_rankings(conn, &data_type, date, concept.as_deref())
            })?;
            print_json(&rs)?;
        }
        Command::Highs { date, period } => {
            let date = parse_date_from_str(&date)?;
            let rs = store.read(|conn| select::select_highs(conn, &data_type, date, period))?;
            print_json(&rs)?;
        }
        Command::Cleanup { hours } => {
            let hours = hours.unwrap_or(cfg.ledger_retention_hours);
            let removed = store.read(|conn| cleanup_older_than(conn, hours))?;
            println!("{} import records removed", removed);
        }
    }
    Ok(())
}

fn importer(concepts: &Option<PathBuf>, store: Arc<Store>, cfg: ImportConfig) -> Result<Importer, Error> {
    let path = concepts
        .as_ref()
        .ok_or_else(|| Error::Config("concept mapping file required, use -c".to_owned()))?;
    let membership = MembershipMap::from_csv_reader(File::open(path)?)?;
    log::info!(
        "{} stocks in {} concepts loaded",
        membership.len(),
        membership.concepts().len()
    );
    Ok(Importer::new(store, Arc::new(membership), cfg))
}

fn read_input(path: &PathBuf) -> Result<(String, String), Error> {
    let content = std::fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok((content, filename))
}

fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, Error> {
    match s {
        Some(s) => Ok(Some(parse_date_from_str(&s)?)),
        None => Ok(None),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, StructOpt)]
#[structopt(name = "gainian-shell", about = "import concept trading volume files")]
struct Opt {
    /// sqlite database file
    #[structopt(short, long, env = "GAINIAN_DB")]
    file: Option<String>,

    /// csv of `code,concept` pairs
    #[structopt(short, long, env = "GAINIAN_CONCEPTS", parse(from_os_str))]
    concepts: Option<PathBuf>,

    /// json file of import settings
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// detect the format and import one file
    Import {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(short, long)]
        overwrite: bool,
    },
    /// import a multi-date file date by date
    Batch {
        #[structopt(parse(from_os_str))]
        input: PathBuf,
        #[structopt(short, long)]
        overwrite: bool,
    },
    /// list import attempts
    Ledger {
        #[structopt(long)]
        from: Option<String>,
        #[structopt(long)]
        to: Option<String>,
        #[structopt(short, long)]
        status: Option<String>,
        #[structopt(short, long, default_value = "20")]
        limit: usize,
    },
    /// concept summaries of one date
    Summary { date: String },
    /// stock rankings of one date
    Ranking {
        date: String,
        #[structopt(short, long)]
        concept: Option<String>,
    },
    /// new highs of one date
    Highs {
        date: String,
        #[structopt(short, long)]
        period: Option<u32>,
    },
    /// remove old import records
    Cleanup {
        #[structopt(long)]
        hours: Option<u64>,
    },
}
