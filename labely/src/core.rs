use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::Parser;
use label_api_types::{IdList, ItemType, LabelSheetBody};
use log::info;

use crate::{
    render::render_sheet_html,
    request::LabelRequest,
    resolver::{CatalogResolver, ItemResolver, StoreResolver},
    sheet::build_sheet,
};

/// This doc string acts as a help message when the user runs '--help'
/// as do all doc strings on fields.
#[derive(Parser, Debug, Clone)]
#[clap(version = clap::crate_version!(), author = clap::crate_authors!("\n"))]
pub struct Opts {
    /// Print debug info
    #[clap(short, long)]
    pub debug: bool,

    /// Print logs as json
    #[clap(short, long)]
    pub json: bool,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser, Debug, Clone)]
pub enum SubCommand {
    Server(Server),

    CreateServerSpec(SpecOut),
    Render(Render),
}

/// Where item names are looked up.
///
/// The item store wins when both a store and a catalog are given.
#[derive(Parser, Clone, Debug, Default)]
pub struct ResolverOpts {
    /// A TOML file mapping product and material ids to names
    #[clap(long, env = "LABELY_CATALOG", parse(from_os_str), value_hint = clap::ValueHint::FilePath)]
    pub catalog: Option<PathBuf>,

    /// Base URL of the item document store
    #[clap(long, env = "LABELY_STORE_URL")]
    pub store_url: Option<String>,

    /// Bearer token for the item document store
    #[clap(long, env = "LABELY_STORE_TOKEN", hide_env_values = true)]
    pub store_token: Option<String>,
}

impl ResolverOpts {
    pub fn resolver(&self) -> Result<Arc<dyn ItemResolver>> {
        if let Some(url) = &self.store_url {
            info!("looking up items in the store at {}", url);
            return Ok(Arc::new(StoreResolver::new(url, self.store_token.clone())?));
        }

        if let Some(path) = &self.catalog {
            let catalog = CatalogResolver::from_file(path)?;
            info!("loaded {} items from catalog {}", catalog.len(), path.display());
            return Ok(Arc::new(catalog));
        }

        bail!("no item source configured, pass --catalog or --store-url");
    }
}

/// A subcommand for running the server.
#[derive(Parser, Clone, Debug)]
pub struct Server {
    /// IP address and port that the server should listen
    #[clap(short, long, env = "LABELY_ADDRESS", default_value = "0.0.0.0:8080")]
    pub address: String,

    /// Sets an optional output file for the API spec
    #[clap(long, parse(from_os_str), value_hint = clap::ValueHint::FilePath)]
    pub spec_file: Option<PathBuf>,

    #[clap(flatten)]
    pub resolver: ResolverOpts,
}

/// A subcommand for outputting the Open API spec file for the server
#[derive(Parser, Clone, Debug)]
pub struct SpecOut {
    /// Sets an optional output file for the API spec
    #[clap(parse(from_os_str), value_hint = clap::ValueHint::FilePath)]
    pub spec_file: PathBuf,
}

/// A subcommand for rendering a single sheet of labels to stdout.
#[derive(Parser, Clone, Debug)]
pub struct Render {
    /// The type of item to print labels for: product or material
    #[clap(long = "type", default_value = "product")]
    pub item_type: ItemType,

    /// The 1-based slot to start at
    #[clap(long)]
    pub start: Option<i64>,

    /// Comma separated id:quantity pairs
    #[clap(long)]
    pub items: Option<String>,

    /// Comma separated ids that share --quantity
    #[clap(long)]
    pub ids: Option<String>,

    /// Labels per id when a single id is given with --ids
    #[clap(long)]
    pub quantity: Option<i64>,

    /// Output format
    #[clap(long, default_value = "html", value_parser = ["html", "json"])]
    pub format: String,

    #[clap(flatten)]
    pub resolver: ResolverOpts,
}

impl Render {
    pub fn body(&self) -> LabelSheetBody {
        LabelSheetBody {
            item_type: self.item_type,
            start: self.start,
            items: self.items.clone(),
            ids: self.ids.clone().map(IdList::Joined),
            quantity: self.quantity,
        }
    }

    /// Build the sheet and return it in the requested format.
    pub async fn run(&self, resolver: &dyn ItemResolver) -> Result<String> {
        let request = LabelRequest::from_body(&self.body());
        let sheet = build_sheet(resolver, &request).await;

        if self.format == "json" {
            Ok(serde_json::to_string_pretty(&sheet)?)
        } else {
            Ok(render_sheet_html(&sheet)?)
        }
    }
}
