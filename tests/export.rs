use anyhow::Result;
use clinical_export::testing::*;
use clinical_export::{
    ClinicalTask, DownloadDataType, ExportOptions, Scope, TaskContext, TaskError, execute, header,
};
use std::collections::HashSet;

fn all_types(ws: &TestWorkspace) -> TaskContext {
    TaskContext::new(ws.input(), ws.output()).with_data_types(DownloadDataType::ALL)
}

#[test]
fn samples_carry_their_owning_specimen() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_donor_ids(["D1"])
        .with_data_types([DownloadDataType::Sample]);
    let report = execute(&ctx)?;

    let table = ws.summary_table(DownloadDataType::Sample)?;
    assert!(table.has_header_of(DownloadDataType::Sample));
    assert_eq!(table.rows.len(), 3);
    assert_eq!(report.branch(DownloadDataType::Sample).map(|b| b.rows), Some(3));

    let pick = |r: &Vec<String>| {
        vec![
            r[table.column("sample_id").unwrap()].clone(),
            r[table.column("specimen_id").unwrap()].clone(),
            r[table.column("donor_id").unwrap()].clone(),
            r[table.column("project_id").unwrap()].clone(),
            r[table.column("submission_specimen_id").unwrap()].clone(),
        ]
    };
    let got: Vec<Vec<String>> = table.rows.iter().map(pick).collect();
    let expected: Vec<Vec<String>> = [
        ["A", "S1", "D1", "PRJ1", "sub-S1"],
        ["B", "S2", "D1", "PRJ1", "sub-S2"],
        ["C", "S2", "D1", "PRJ1", "sub-S2"],
    ]
    .iter()
    .map(|r| r.iter().map(|s| s.to_string()).collect())
    .collect();
    assert_rows_unordered_equal(&got, &expected);
    Ok(())
}

#[test]
fn every_type_gets_one_table_with_its_header() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;

    let report = execute(&all_types(&ws))?;
    assert_eq!(report.donors, 3);
    assert_eq!(report.branches.len(), DownloadDataType::ALL.len());
    assert!(report.diagnostics.is_empty());

    let expected_rows = [
        (DownloadDataType::Donor, 3),
        (DownloadDataType::DonorExposure, 2),
        (DownloadDataType::DonorFamily, 1),
        (DownloadDataType::DonorTherapy, 1),
        (DownloadDataType::Specimen, 4),
        (DownloadDataType::Sample, 4),
    ];
    for (data_type, rows) in expected_rows {
        let table = ws.summary_table(data_type)?;
        assert!(table.has_header_of(data_type), "{data_type} header");
        assert_eq!(table.rows.len(), rows, "{data_type} rows");
        assert!(table.rows.iter().all(|r| r.len() == header(data_type).len()));
    }
    Ok(())
}

#[test]
fn donor_values_are_formatted_by_column_kind() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&[DonorBuilder::new("D1", "PRJ1")
        .field("donor_age_at_diagnosis", 45.0)
        .field("donor_survival_time", "120")
        .field("donor_sex", serde_json::Value::Null)
        .exposure(serde_json::json!({"tobacco_smoking_intensity": 0.5}))
        .build()])?;

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_data_types([DownloadDataType::Donor, DownloadDataType::DonorExposure]);
    execute(&ctx)?;

    let donor = ws.summary_table(DownloadDataType::Donor)?;
    assert_eq!(donor.values("donor_age_at_diagnosis"), vec!["45"]);
    assert_eq!(donor.values("donor_survival_time"), vec!["120"]);
    assert_eq!(donor.values("donor_sex"), vec![""]);
    assert_eq!(donor.values("submitted_donor_id"), vec!["sub-D1"]);

    let exposure = ws.summary_table(DownloadDataType::DonorExposure)?;
    assert_eq!(exposure.values("tobacco_smoking_intensity"), vec!["0.5"]);
    assert_eq!(exposure.values("donor_id"), vec!["D1"]);
    Ok(())
}

#[test]
fn donor_filter_keeps_exactly_the_intersection() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_donor_ids(["D2", "D3", "D404"])
        .with_data_types([DownloadDataType::Donor]);
    let report = execute(&ctx)?;
    assert_eq!(report.donors, 2);

    let ids: HashSet<String> = ws
        .summary_table(DownloadDataType::Donor)?
        .values("donor_id")
        .into_iter()
        .map(str::to_string)
        .collect();
    assert_eq!(ids, HashSet::from(["D2".to_string(), "D3".to_string()]));

    // An empty filter includes every donor.
    let report = execute(&TaskContext::new(ws.input(), ws.output()).with_data_types([DownloadDataType::Donor]))?;
    assert_eq!(report.donors, 3);
    Ok(())
}

#[test]
fn empty_results_still_write_the_header() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&[DonorBuilder::new("D1", "PRJ1")
        .specimen(SpecimenBuilder::new("S1"))
        .field("exposures", serde_json::json!([]))
        .build()])?;

    let ctx = TaskContext::new(ws.input(), ws.output()).with_data_types([
        DownloadDataType::DonorExposure,
        DownloadDataType::DonorFamily,
        DownloadDataType::Sample,
    ]);
    let report = execute(&ctx)?;
    assert_eq!(report.total_rows(), 0);
    assert!(report.diagnostics.is_empty());

    for data_type in [
        DownloadDataType::DonorExposure,
        DownloadDataType::DonorFamily,
        DownloadDataType::Sample,
    ] {
        let table = ws.summary_table(data_type)?;
        assert!(table.has_header_of(data_type));
        assert!(table.rows.is_empty());
    }
    Ok(())
}

#[test]
fn runs_are_idempotent() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;
    let ctx = all_types(&ws);

    execute(&ctx)?;
    let first: Vec<Table> = DownloadDataType::ALL
        .iter()
        .map(|t| ws.summary_table(*t))
        .collect::<Result<_>>()?;
    execute(&ctx)?;
    for (t, before) in DownloadDataType::ALL.iter().zip(first) {
        let after = ws.summary_table(*t)?;
        assert_eq!(after.header, before.header);
        assert_rows_unordered_equal(&after.rows, &before.rows);
    }
    Ok(())
}

#[test]
fn sequential_and_parallel_produce_the_same_rows() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let donors: Vec<_> = (0..40)
        .map(|i| {
            DonorBuilder::new(&format!("D{i}"), if i % 2 == 0 { "PRJ1" } else { "PRJ2" })
                .specimen(SpecimenBuilder::new(&format!("S{i}a")).sample(&format!("X{i}")))
                .specimen(
                    SpecimenBuilder::new(&format!("S{i}b"))
                        .sample(&format!("Y{i}"))
                        .sample(&format!("Z{i}")),
                )
                .build()
        })
        .collect();
    ws.write_donors(&donors)?;

    let seq_out = ws.root().join("seq");
    let par_out = ws.root().join("par");
    let seq = TaskContext::new(ws.input(), &seq_out)
        .with_data_types([DownloadDataType::Specimen, DownloadDataType::Sample])
        .with_options(ExportOptions {
            sequential: true,
            ..Default::default()
        });
    let par = TaskContext::new(ws.input(), &par_out)
        .with_data_types([DownloadDataType::Specimen, DownloadDataType::Sample])
        .with_options(ExportOptions {
            threads: Some(3),
            partitions: Some(7),
            ..Default::default()
        });
    execute(&seq)?;
    execute(&par)?;

    for t in [DownloadDataType::Specimen, DownloadDataType::Sample] {
        let a = Table::read(clinical_export::output_path(&seq_out, t, &Scope::AllProjects))?;
        let b = Table::read(clinical_export::output_path(&par_out, t, &Scope::AllProjects))?;
        assert_eq!(a.header, b.header);
        assert_rows_unordered_equal(&a.rows, &b.rows);
    }
    let samples = Table::read(clinical_export::output_path(&par_out, DownloadDataType::Sample, &Scope::AllProjects))?;
    assert_eq!(samples.rows.len(), 120);
    Ok(())
}

#[test]
fn per_project_tables_hold_only_their_project() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_data_types([DownloadDataType::Sample, DownloadDataType::DonorFamily])
        .with_options(ExportOptions {
            split_by_project: true,
            ..Default::default()
        });
    let report = execute(&ctx)?;

    let prj1 = Table::read(ws.project_path(DownloadDataType::Sample, "PRJ1"))?;
    let prj2 = Table::read(ws.project_path(DownloadDataType::Sample, "PRJ2"))?;
    assert_all_rows(&prj1.values("project_id"), |p| *p == "PRJ1");
    assert_eq!(prj1.rows.len(), 3);
    assert_eq!(prj2.values("sample_id"), vec!["D"]);

    // Only PRJ1 has family rows, so PRJ2 gets no family table.
    assert!(ws.project_path(DownloadDataType::DonorFamily, "PRJ1").exists());
    assert!(!ws.project_path(DownloadDataType::DonorFamily, "PRJ2").exists());

    let family = report.branch(DownloadDataType::DonorFamily).unwrap();
    let scopes: Vec<&Scope> = family.files.iter().map(|f| &f.scope).collect();
    assert_eq!(scopes, vec![&Scope::AllProjects, &Scope::Project("PRJ1".into())]);
    Ok(())
}

#[test]
fn reported_sizes_match_the_files() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;
    let report = execute(&all_types(&ws))?;
    for file in report.files() {
        assert_eq!(std::fs::metadata(&file.path)?.len(), file.bytes);
        assert!(file.path.starts_with(ws.output()));
    }
    Ok(())
}

#[test]
fn cache_is_released_after_execution() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;
    let task = ClinicalTask::new();

    task.execute(&all_types(&ws))?;
    assert_eq!(task.pipeline().node_count(), 0);

    // Released on failure too.
    let bad = TaskContext::new(ws.input(), ws.root().join("blocked"))
        .with_data_types([DownloadDataType::Donor]);
    std::fs::write(ws.root().join("blocked"), "not a directory")?;
    let err = task.execute(&bad).unwrap_err();
    assert_eq!(err.kind(), "OutputError");
    assert_eq!(task.pipeline().node_count(), 0);
    Ok(())
}

#[test]
fn cancelled_task_launches_nothing() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;
    let cancel = clinical_export::CancelToken::new();
    cancel.cancel();

    let task = ClinicalTask::new();
    let err = task
        .execute(&all_types(&ws).with_cancel_token(cancel))
        .unwrap_err();
    assert!(matches!(err, TaskError::Cancelled));
    assert!(!ws.output().exists());
    assert_eq!(task.pipeline().node_count(), 0);
    Ok(())
}

#[test]
fn donors_missing_optional_identifiers_are_still_exported() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let therapy = serde_json::json!({"first_therapy_type": "surgery"});
    ws.write_donors(&[
        DonorBuilder::new("D1", "PRJ1")
            .without("submitted_donor_id")
            .therapy(therapy.clone())
            .build(),
        DonorBuilder::new("D2", "PRJ1")
            .without("project_id")
            .therapy(therapy.clone())
            .build(),
        DonorBuilder::new("D3", "PRJ2").therapy(therapy).build(),
    ])?;

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_data_types([DownloadDataType::Donor, DownloadDataType::DonorTherapy]);
    let report = execute(&ctx)?;

    // The donor table converts every donor as it is.
    let donor = ws.summary_table(DownloadDataType::Donor)?;
    assert_eq!(donor.rows.len(), 3);
    assert_eq!(report.branch(DownloadDataType::Donor).map(|b| b.skipped), Some(0));
    let by_id = |id: &str| -> Vec<String> {
        donor
            .rows
            .iter()
            .find(|r| r[0] == id)
            .cloned()
            .unwrap_or_default()
    };
    assert_eq!(by_id("D1")[donor.column("submitted_donor_id").unwrap()], "");
    assert_eq!(by_id("D2")[donor.column("project_id").unwrap()], "");
    assert_eq!(by_id("D3")[donor.column("submitted_donor_id").unwrap()], "sub-D3");

    // Nested rows only need donor_id and project_id to be joined back.
    let therapy = ws.summary_table(DownloadDataType::DonorTherapy)?;
    let mut ids: Vec<&str> = therapy.values("donor_id");
    ids.sort();
    assert_eq!(ids, vec!["D1", "D3"]);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].donor_id.as_deref(), Some("D2"));
    assert!(report.diagnostics[0].message.contains("project_id"));
    Ok(())
}

#[test]
fn numeric_donor_ids_can_be_selected_by_their_exported_text() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&[
        DonorBuilder::new("ignored", "PRJ1").field("donor_id", 42).build(),
        DonorBuilder::new("D2", "PRJ1").build(),
    ])?;

    let all = execute(&TaskContext::new(ws.input(), ws.output()).with_data_types([DownloadDataType::Donor]))?;
    assert_eq!(all.donors, 2);
    assert!(ws.summary_table(DownloadDataType::Donor)?.values("donor_id").contains(&"42"));

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_donor_ids(["42"])
        .with_data_types([DownloadDataType::Donor]);
    let report = execute(&ctx)?;
    assert_eq!(report.donors, 1);
    assert_eq!(ws.summary_table(DownloadDataType::Donor)?.values("donor_id"), vec!["42"]);
    Ok(())
}

#[test]
fn a_type_requested_twice_runs_once() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write_donors(&scenario_donors())?;

    let ctx = TaskContext::new(ws.input(), ws.output())
        .with_data_types([DownloadDataType::Sample, DownloadDataType::Donor, DownloadDataType::Sample]);
    assert_eq!(ctx.data_types, vec![DownloadDataType::Sample, DownloadDataType::Donor]);

    // Also when the list is assigned directly.
    let mut ctx = TaskContext::new(ws.input(), ws.output());
    ctx.data_types = vec![DownloadDataType::Sample; 3];
    let report = execute(&ctx)?;
    assert_eq!(report.branches.len(), 1);
    assert_eq!(report.total_rows(), 4);
    assert_eq!(ws.summary_table(DownloadDataType::Sample)?.rows.len(), 4);
    Ok(())
}
