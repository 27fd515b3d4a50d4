//! Simulate a neutral-cold-neutral exposure and print a per-step summary

use thermoreg::{Anthropometrics, EnvironmentalCondition, Sex, Simulator};

fn main() {
    let sim = Simulator::default();
    let body = Anthropometrics::new(1.7, 60.0, 30.0, Sex::Male);

    let mut state = match sim.initialize(&body) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return;
        }
    };

    let mut schedule = vec![sim.thermoneutral_condition(600.0)];
    schedule.extend((0..6).map(|_| EnvironmentalCondition::operative(10.0, 40.0, 0.1, 1.0, 0.3, 300.0)));
    schedule.extend((0..4).map(|_| EnvironmentalCondition::operative(28.0, 50.0, 0.1, 1.0, 0.3, 300.0)));

    match sim.run(&mut state, &schedule) {
        Ok(outputs) => {
            println!("time_min,core_c,skin_c,shivering_w,sweat_g_h,status");
            for out in outputs {
                println!(
                    "{:.0},{:.3},{:.3},{:.1},{:.1},{:?}",
                    out.elapsed_s / 60.0,
                    out.mean_core_temperature,
                    out.mean_skin_temperature,
                    out.shivering,
                    out.sweat_rate,
                    out.convergence.status
                );
            }
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
