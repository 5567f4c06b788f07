//! Human-readable table dumps for the CLI.

use std::io::{self, Write};

use crate::info::{DiagnosisInfo, GhmRootInfo, GhsAccessInfo, GhsPriceInfo, ProcedureInfo};
use crate::set::TableSet;

pub fn dump_headers(set: &TableSet, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Tables:")?;
    for table in &set.tables {
        writeln!(
            out,
            "  {} [{}, FG {}.{:02}, built {}] {} -- {}",
            table.kind.name(),
            table.path,
            table.version.0,
            table.version.1,
            table.build_date,
            table.limit_from,
            table.limit_to,
        )?;
    }

    writeln!(out, "Indexes:")?;
    for index in &set.indexes {
        writeln!(
            out,
            "  {} -- {} (changed 0x{:03X})",
            index.limit_from, index.limit_to, index.changed_tables
        )?;
    }
    Ok(())
}

pub fn dump_diagnosis(diag: &DiagnosisInfo, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "  {}:", diag.code)?;
    for (label, attr) in [("male", &diag.attributes[0]), ("female", &diag.attributes[1])] {
        writeln!(
            out,
            "    {label}: CMD {:02}, jump {}, severity {}",
            attr.cmd, attr.jump, attr.severity
        )?;
        if !diag.sex_difference {
            break;
        }
    }
    writeln!(out, "    warnings: 0x{:04X}", diag.warnings)?;
    writeln!(
        out,
        "    exclusion row {}, bit {}+{:#04X}",
        diag.exclusion_set_idx, diag.cma_exclusion.offset, diag.cma_exclusion.value
    )?;
    Ok(())
}

pub fn dump_procedures(procs: &[ProcedureInfo], out: &mut impl Write) -> io::Result<()> {
    for proc in procs {
        writeln!(
            out,
            "  {}/{} [{} -- {}] activities 0b{:06b}",
            proc.code, proc.phase, proc.valid_from, proc.valid_until, proc.activities
        )?;
    }
    Ok(())
}

pub fn dump_ghm_root(root: &GhmRootInfo, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "  {}:", root.code)?;
    if root.confirm_duration_threshold > 0 {
        writeln!(out, "    confirmation under {} nights", root.confirm_duration_threshold)?;
    }
    if root.allow_ambulatory {
        writeln!(out, "    ambulatory allowed")?;
    }
    if root.short_duration_threshold > 0 {
        writeln!(out, "    short-stay mode under {} nights", root.short_duration_threshold)?;
    }
    if root.young_severity_limit > 0 {
        writeln!(
            out,
            "    severity >= {} under {} years",
            root.young_severity_limit, root.young_age_threshold
        )?;
    }
    if root.old_severity_limit > 0 {
        writeln!(
            out,
            "    severity >= {} over {} years",
            root.old_severity_limit, root.old_age_threshold
        )?;
    }
    if root.childbirth_severity_list > 0 {
        writeln!(out, "    childbirth severity list {}", root.childbirth_severity_list)?;
    }
    Ok(())
}

pub fn dump_ghs_access(chunks: &[GhsAccessInfo], out: &mut impl Write) -> io::Result<()> {
    for chunk in chunks {
        writeln!(
            out,
            "  GHM {} => GHS {} (public) / {} (private)",
            chunk.ghm, chunk.ghs[0], chunk.ghs[1]
        )?;
        if chunk.minimal_age > 0 {
            writeln!(out, "    minimal age {}", chunk.minimal_age)?;
        }
        if chunk.minimal_duration > 0 {
            writeln!(out, "    minimal duration {}", chunk.minimal_duration)?;
        }
        if chunk.unit_authorization > 0 {
            writeln!(out, "    unit authorization {}", chunk.unit_authorization)?;
        }
        if chunk.bed_authorization > 0 {
            writeln!(out, "    bed authorization {}", chunk.bed_authorization)?;
        }
        if chunk.main_diagnosis_mask.is_set() {
            writeln!(
                out,
                "    main diagnosis list {}+{:#04X}",
                chunk.main_diagnosis_mask.offset, chunk.main_diagnosis_mask.value
            )?;
        }
        if chunk.diagnosis_mask.is_set() {
            writeln!(
                out,
                "    diagnosis list {}+{:#04X}",
                chunk.diagnosis_mask.offset, chunk.diagnosis_mask.value
            )?;
        }
        for mask in &chunk.procedure_masks {
            writeln!(out, "    procedure list {}+{:#04X}", mask.offset, mask.value)?;
        }
    }
    Ok(())
}

pub fn dump_ghs_price(price: &GhsPriceInfo, out: &mut impl Write) -> io::Result<()> {
    writeln!(
        out,
        "  GHS {}: {} cents, EXB < {}{} ({} cents), EXH >= {} ({} cents/day)",
        price.ghs,
        price.price_cents,
        price.exb_threshold,
        if price.exb_once { " (once)" } else { "" },
        price.exb_cents,
        price.exh_threshold,
        price.exh_cents,
    )?;
    Ok(())
}
