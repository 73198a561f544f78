use criterion::{black_box, criterion_group, criterion_main, Criterion};

use album_date_rs::folder_name::resolve_folder_name;
use album_date_rs::tag_output::parse_tag_output;

/// Output shaped like `exiftool -fast -G -t -m -q -q` on a camera JPEG
fn synthetic_tag_output(lines: usize) -> String {
    let mut output = String::new();
    for i in 0..lines {
        output.push_str(&format!("EXIF\tTag {}\tvalue {}\r\n", i, i));
    }
    output.push_str("EXIF\tThumbnail Image\t(Binary data 5120 bytes, use -b option to extract)\r\n");
    output.push_str("EXIF\tCreate Date\t2021:03:09 10:15:00.000\r\n");
    output
}

fn benchmark_folder_names(c: &mut Criterion) {
    let names = [
        "東京都 - 渋谷区, 2021年3月9日",
        "渋谷区, 2021年12月31日",
        "2020年1月1日",
        "Vacation",
    ];

    c.bench_function("resolve_folder_name", |b| {
        b.iter(|| {
            for name in &names {
                let _ = black_box(resolve_folder_name(black_box(name)));
            }
        })
    });
}

fn benchmark_tag_output(c: &mut Criterion) {
    let output = synthetic_tag_output(300);

    c.bench_function("parse_tag_output_300_lines", |b| {
        b.iter(|| {
            let tags = parse_tag_output(black_box(&output));
            black_box(tags.find("Create Date").is_some())
        })
    });
}

criterion_group!(benches, benchmark_folder_names, benchmark_tag_output);
criterion_main!(benches);
