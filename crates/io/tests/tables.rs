use std::fs;

use recongrid_core::CellValue;
use recongrid_io::{read_table, write_table, IoError};
use tempfile::tempdir;

#[test]
fn csv_statement_to_xlsx_and_back() {
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("June Statement.csv");
    fs::write(
        &csv_path,
        "PO;ROID;Statement amount\n1001;R-1;\"$1,200.00\"\n;R-2;50\n;;\n",
    )
    .unwrap();

    let statement = read_table(&csv_path, None).unwrap();
    assert_eq!(statement.name(), "June Statement");
    assert_eq!(statement.len(), 2);

    let xlsx_path = dir.path().join("Initial_Merged_Statement_Estimates.xlsx");
    write_table(&statement, &xlsx_path, "Merged").unwrap();

    let back = read_table(&xlsx_path, Some("Merged")).unwrap();
    assert_eq!(back.columns(), statement.columns());
    assert_eq!(back.cell(0, "Statement amount"), &CellValue::from("$1,200.00"));
    assert!(back.cell(1, "PO").is_empty());
    assert_eq!(back.cell(1, "ROID"), &CellValue::from("R-2"));
}

#[test]
fn csv_output_by_extension() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("estimates.tsv");
    fs::write(&src, "PO\tPayable Amount\nA1\t90\n").unwrap();
    let set = read_table(&src, None).unwrap();

    let out = dir.path().join("copy.csv");
    write_table(&set, &out, "ignored").unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), "PO,Payable Amount\nA1,90\n");
}

#[test]
fn unsupported_extensions_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    fs::write(&path, "x").unwrap();
    assert!(matches!(read_table(&path, None), Err(IoError::UnsupportedFormat(_))));

    let set = read_table(&{
        let p = dir.path().join("a.csv");
        fs::write(&p, "PO\nA1\n").unwrap();
        p
    }, None)
    .unwrap();
    let err = write_table(&set, &dir.path().join("out.ods"), "Sheet1").unwrap_err();
    assert!(matches!(err, IoError::UnsupportedFormat(_)));
}
