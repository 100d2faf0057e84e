use crate::model::*;

// 1番ごとに倍
fn base_point(fan: usize) -> Score {
    1 << fan.min(16)
}

// 和了1件につき敗者1人が支払う点数
pub fn hu_point(fan: usize, is_zimo: bool, opts: &DeskOptions) -> Score {
    let base = base_point(fan);
    if is_zimo && !opts.is_zimo_fan() {
        base * 2
    } else {
        base
    }
}

// 杠1回につき支払う側1人あたりの点数
// 暗杠: 他家全員から2, 明杠: 放杠者から2, 巴杠: 他家全員から1
pub fn gang_point(gang_type: GangType) -> Score {
    match gang_type {
        GangType::An | GangType::Ming => 2,
        GangType::Ba => 1,
    }
}

pub fn gang_title(gang_type: GangType) -> &'static str {
    match gang_type {
        GangType::An => "暗杠",
        GangType::Ming => "明杠",
        GangType::Ba => "巴杠",
    }
}

#[test]
fn test_hu_point() {
    let opts = DeskOptions::default();
    assert_eq!(hu_point(0, false, &opts), 1);
    assert_eq!(hu_point(3, false, &opts), 8);
    assert_eq!(hu_point(3, true, &opts), 16);

    let opts = DeskOptions {
        zimo: ZIMO_FAN.to_string(),
        ..Default::default()
    };
    assert_eq!(hu_point(3, true, &opts), 8);
}

// cargo test print_points_table -- --nocapture
#[test]
fn print_points_table() {
    let opts = DeskOptions::default();
    println!("番数 点数(点炮/自摸) =================");
    for fan in 0..=6 {
        println!(
            "{fan}番: {:3} / {:3}",
            hu_point(fan, false, &opts),
            hu_point(fan, true, &opts)
        );
    }
    for t in [GangType::An, GangType::Ming, GangType::Ba] {
        println!("{}: {}", gang_title(t), gang_point(t));
    }
}
