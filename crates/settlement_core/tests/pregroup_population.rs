use settlement_core::model::settlement::total_population;
use settlement_core::population::redistribute;
use settlement_core::pregroup::pregroup_small_settlements;
use settlement_core::Settlement;
use std::collections::HashSet;

#[test]
fn two_small_areas_in_one_region_merge_under_largest_name() {
    let input = vec![
        Settlement::new("A, Region1", 500),
        Settlement::new("B, Region1", 600),
    ];

    let output = pregroup_small_settlements(input, 1000, 1).unwrap();

    assert_eq!(output.len(), 1);
    assert_eq!(output[0].name, "B, Region1");
    assert_eq!(output[0].population, 1100);
    assert_eq!(
        output[0].constituent_settlements,
        vec!["B, Region1".to_string(), "A, Region1".to_string()]
    );
}

#[test]
fn small_input_is_returned_unchanged() {
    let input = vec![
        Settlement::new("A, Region1", 5),
        Settlement::new("B, Region2", 6),
    ];

    let output = pregroup_small_settlements(input.clone(), 1000, 1000).unwrap();
    assert_eq!(output, input);
}

#[test]
fn pregrouping_conserves_population_and_region_purity() {
    let regions = ["Cork", "Kerry", "Mayo"];
    let input: Vec<Settlement> = (0..60u64)
        .map(|i| {
            let region = regions[(i % 3) as usize];
            Settlement::new(format!("Area{i}, {region}"), 37 * i % 1500 + 1)
        })
        .collect();
    let input_population = total_population(&input);
    let input_names: HashSet<String> = input.iter().map(|s| s.name.clone()).collect();

    let output = pregroup_small_settlements(input.clone(), 1000, 10).unwrap();

    assert!(output.len() <= input.len());
    assert_eq!(total_population(&output), input_population);

    let mut covered = HashSet::new();
    for settlement in &output {
        let region = settlement.admin_region();
        for constituent in &settlement.constituent_settlements {
            assert!(input_names.contains(constituent));
            assert!(constituent.ends_with(region), "{constituent} left {region}");
            assert!(covered.insert(constituent.clone()), "{constituent} appears twice");
        }
    }
    assert_eq!(covered, input_names);
}

#[test]
fn areas_above_floor_pass_through() {
    let input = vec![
        Settlement::new("Big, Cork", 5000),
        Settlement::new("Tiny, Cork", 10),
        Settlement::new("Small, Cork", 20),
    ];

    let output = pregroup_small_settlements(input, 1000, 2).unwrap();

    let big = output.iter().find(|s| s.name == "Big, Cork").unwrap();
    assert_eq!(big.population, 5000);
    assert_eq!(big.constituent_settlements, vec!["Big, Cork".to_string()]);
    let tail = output.iter().find(|s| s.name == "Small, Cork").unwrap();
    assert_eq!(tail.population, 30);
}

#[test]
fn redistribution_residual_is_zero_for_awkward_ratios() {
    let mut list: Vec<Settlement> = [7u64, 11, 13, 17, 19]
        .iter()
        .enumerate()
        .map(|(i, p)| Settlement::new(format!("S{i}, R"), *p))
        .collect();
    let before = total_population(&list);

    redistribute(&mut list, 23).unwrap();
    assert_eq!(total_population(&list), before + 23);

    redistribute(&mut list, -40).unwrap();
    assert_eq!(total_population(&list), before + 23 - 40);
}
