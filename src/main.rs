use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use scriptura::diagnostics::Diagnostics;
use scriptura::output::export_all;
use scriptura::tables::book_orders::BookOrdersConverter;
use scriptura::tables::books_codes::BooksCodesConverter;
use scriptura::tables::books_names::BooksNamesConverter;
use scriptura::tables::iso_languages::LanguagesConverter;
use scriptura::tables::organisational::{ComponentTables, OrgSystemsConverter};
use scriptura::tables::punctuation::PunctuationSystemsConverter;
use scriptura::tables::references_links::ReferencesLinksConverter;
use scriptura::tables::usfm_markers::UsfmMarkersConverter;
use scriptura::tables::versification::VersificationSystemsConverter;
use scriptura::xml::XmlHeader;
use scriptura::DataTable;

/// Loads the hand-maintained Bible reference tables (book codes, book
/// orders, versification, punctuation, book names, languages, USFM
/// markers, organisational systems, cross-reference links), validates
/// them and pivots them into lookup structures.
///
/// Without **--export** each selected table is loaded and a one-line
/// summary printed (demo mode). With **--export** every exporter runs
/// for each selected table, writing the binary cache, JSON mirror,
/// Python source and C header/source pair into the output folder.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Which table to process: books-codes, book-orders, versification,
    /// punctuation, books-names, iso-languages, usfm-markers,
    /// organisational, references-links or all
    #[clap(short, long, value_name = "name", default_value_t)]
    table: DataTable,

    /// Run all exporters instead of printing summaries
    #[clap(short, long)]
    export: bool,

    /// Folder holding the XML source tables
    #[clap(long, value_name = "dir", default_value = "data")]
    data_dir: PathBuf,

    /// Destination folder for exported files
    #[clap(long, value_name = "dir", default_value = "derived")]
    out_dir: PathBuf,

    /// Turn on debug logging
    #[clap(short, long)]
    debug: bool,
}

impl Args {
    fn wants(&self, table: DataTable) -> bool {
        self.table == table || self.table == DataTable::All
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .init();

    let mut diags = Diagnostics::new();
    run(&args, &mut diags)?;

    info!(
        "finished: {} warnings, {} errors",
        diags.warning_count(),
        diags.error_count()
    );
    Ok(())
}

fn run(args: &Args, diags: &mut Diagnostics) -> Result<()> {
    // The book-codes registry backs the cross-checks of most other
    // tables, so it is loaded whenever any of them is selected.
    let needs_registry = [
        DataTable::BooksCodes,
        DataTable::BookOrders,
        DataTable::Versification,
        DataTable::BooksNames,
        DataTable::Organisational,
    ]
    .into_iter()
    .any(|t| args.wants(t));

    let registry = if needs_registry {
        let mut converter =
            BooksCodesConverter::load(&args.data_dir.join("BibleBooksCodes.xml"), diags)?;
        converter.import(diags);
        if args.wants(DataTable::BooksCodes) {
            if args.export {
                let header = converter.header().cloned();
                export_all(converter.data(), header.as_ref(), &args.out_dir)?;
            } else {
                println!("{}", converter.summary());
            }
        }
        Some(converter)
    } else {
        None
    };
    let registry = registry.as_ref().map(|c| c.data());

    // Organisational systems cross-validate against these four, so they
    // are loaded either on their own account or as components.
    let composing = args.wants(DataTable::Organisational);

    let book_orders = if args.wants(DataTable::BookOrders) || composing {
        let registry = registry.expect("registry loaded above");
        let mut converter =
            BookOrdersConverter::load(&args.data_dir.join("BookOrders"), diags)?;
        converter.import(registry, diags);
        if args.wants(DataTable::BookOrders) {
            finish(args, converter.data(), None, &converter.summary())?;
        }
        Some(converter)
    } else {
        None
    };

    let versifications = if args.wants(DataTable::Versification) || composing {
        let registry = registry.expect("registry loaded above");
        let mut converter =
            VersificationSystemsConverter::load(&args.data_dir.join("VersificationSystems"), diags)?;
        converter.import(registry, diags);
        if args.wants(DataTable::Versification) {
            finish(args, converter.data(), None, &converter.summary())?;
        }
        Some(converter)
    } else {
        None
    };

    let punctuations = if args.wants(DataTable::Punctuation) || composing {
        let mut converter =
            PunctuationSystemsConverter::load(&args.data_dir.join("PunctuationSystems"), diags)?;
        converter.import(diags);
        if args.wants(DataTable::Punctuation) {
            finish(args, converter.data(), None, &converter.summary())?;
        }
        Some(converter)
    } else {
        None
    };

    let books_names = if args.wants(DataTable::BooksNames) || composing {
        let registry = registry.expect("registry loaded above");
        let mut converter =
            BooksNamesConverter::load(&args.data_dir.join("BooksNames"), diags)?;
        converter.import(registry, diags);
        if args.wants(DataTable::BooksNames) {
            finish(args, converter.data(), None, &converter.summary())?;
        }
        Some(converter)
    } else {
        None
    };

    if args.wants(DataTable::IsoLanguages) {
        let mut converter = LanguagesConverter::load(&args.data_dir, diags)?;
        converter.import(diags);
        finish(args, converter.data(), converter.header(), &converter.summary())?;
    }

    if args.wants(DataTable::UsfmMarkers) {
        let mut converter =
            UsfmMarkersConverter::load(&args.data_dir.join("USFM2Markers.xml"), diags)?;
        converter.import(diags);
        finish(args, converter.data(), converter.header(), &converter.summary())?;
    }

    if composing {
        let mut converter = OrgSystemsConverter::load(
            &args.data_dir.join("BibleOrganisationalSystems.xml"),
            diags,
        )?;
        let components = ComponentTables {
            book_orders: book_orders.as_ref().expect("loaded above").data(),
            versifications: versifications.as_ref().expect("loaded above").data(),
            punctuations: punctuations.as_ref().expect("loaded above").data(),
            books_names: books_names.as_ref().expect("loaded above").data(),
        };
        converter.import(&components, diags);
        finish(args, converter.data(), converter.header(), &converter.summary())?;
    }

    if args.wants(DataTable::ReferencesLinks) {
        let mut converter =
            ReferencesLinksConverter::load(&args.data_dir.join("BibleReferencesLinks.xml"), diags)?;
        converter.import(diags);
        let summary = converter.summary();
        if args.export {
            let (source, data) = converter.into_parts();
            export_all(&data, source.header.as_ref(), &args.out_dir)?;
        } else {
            println!("{summary}");
        }
    }

    Ok(())
}

fn finish<T: scriptura::tables::TableExport>(
    args: &Args,
    data: &T,
    header: Option<&XmlHeader>,
    summary: &str,
) -> Result<()> {
    if args.export {
        export_all(data, header, &args.out_dir)
    } else {
        println!("{summary}");
        Ok(())
    }
}
