use troupe::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pos(f32, f32, f32);
#[derive(Clone, Copy, Debug, PartialEq)]
struct Vel(f32, f32, f32);

fn main() {
    tracing_subscriber::fmt::init();

    // create world
    let mut world = World::new();

    // create entities
    for _ in 0..4 {
        world.spawn((Pos(1., 2., 3.), Vel(1., 2., 3.)));
    }

    // update positions every frame
    world.add_schedule(MAIN_SCHEDULE, Box::new(SerialExecutor::new()));
    world.add_system(
        MAIN_SCHEDULE,
        SystemBuilder::new("integrate")
            .with_query::<(Write<Pos>, Read<Vel>)>()
            .build(|ctx, _| {
                ctx.query::<(Write<Pos>, Read<Vel>)>().for_each(|(mut pos, vel)| {
                    pos.0 += vel.0;
                    pos.1 += vel.1;
                    pos.2 += vel.2;
                });
            }),
    );

    world.run();

    world.query_read::<(EntityIdProbe, Read<Pos>)>().for_each(|(id, pos)| {
        println!("{} is at {:?}", id, pos);
    });
}
