use clap::Parser;

/// This program computes the plan/fact report of field visit campaigns.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the report: the input files, the reporting period and the
    /// stage weights. The command line options below override what the file specifies.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference report in JSON format. If provided, planfact will check that the computed report
    /// matches the reference, and fail otherwise.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the report will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) The visit log. Setting this option replaces the visit sources of the --config option.
    #[clap(short, long, value_parser)]
    pub visits: Option<String>,

    /// (file path, optional) The project registry. Without it, no project carries a plan.
    #[clap(long, value_parser)]
    pub registry: Option<String>,

    /// (csv or xlsx) The type of the input files. By default, it is guessed from the file extension.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use. By default, the first worksheet.
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (date, YYYY-MM-DD) The first day of the reporting period.
    #[clap(long, value_parser)]
    pub period_start: Option<String>,

    /// (date, YYYY-MM-DD) The last day of the reporting period.
    #[clap(long, value_parser)]
    pub period_end: Option<String>,

    /// (four comma-separated numbers, default 1,1,1,1) The relative weights of the four stages of a project.
    #[clap(long, value_parser, use_value_delimiter = true)]
    pub weights: Option<Vec<String>>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
