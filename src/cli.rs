use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipfs")]
#[command(version)]
#[command(about = "Browse a ZIP archive as a read-only filesystem", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipfs site.zip                      list the archive root\n  \
  zipfs -v site.zip /css              list /css with sizes and dates\n  \
  zipfs -p site.zip /index.html       print a file\n  \
  zipfs -p -s 1024 site.zip /app.js   print a file from byte 1024\n  \
  zipfs -l https://example.com/site.zip   list a remote archive")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "ARCHIVE")]
    pub file: String,

    /// Paths inside the archive (default: /)
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// List directories (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely: size, date and time
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write file contents to stdout
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Start piping at this byte offset
    #[arg(short = 's', value_name = "OFFSET", requires = "pipe")]
    pub offset: Option<u64>,

    /// Directory for temporary files created when seeking
    #[arg(short = 't', value_name = "DIR")]
    pub temp_dir: Option<String>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Paths to act on, `/` when none were given.
    pub fn paths(&self) -> Vec<&str> {
        if self.paths.is_empty() {
            vec!["/"]
        } else {
            self.paths.iter().map(String::as_str).collect()
        }
    }
}
